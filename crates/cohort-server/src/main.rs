//! cohort-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), loads the OIDC
//! signing keys (refreshed hourly), opens the SQLite store and serves the
//! Cohort API over HTTP.

mod settings;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Duration;
use clap::Parser;
use cohort_api::{
  AppState, AuthConfig,
  auth::{OidcVerifier, SessionIssuer, TelegramVerifier},
};
use cohort_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

/// How often signing keys are re-fetched in the background.
const KEY_REFRESH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

#[derive(Parser)]
#[command(author, version, about = "Cohort API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  let auth = build_auth(&cfg).await?;
  if cfg.bypass_enabled() {
    tracing::warn!("AUTH_BYPASS_SECRET is set; bypass and testing endpoints are enabled");
  }

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let app = cohort_api::router(AppState::new(store, auth));
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn build_auth(cfg: &ServerConfig) -> anyhow::Result<AuthConfig> {
  let oidc = OidcVerifier::new(&cfg.oidc_client_id)
    .with_source(reqwest::Client::new(), &cfg.oidc_jwks_url)
    .restrict_domain(cfg.admin_domain.clone())
    .restrict_emails(cfg.admin_emails.clone());
  if let Err(e) = oidc.refresh().await {
    tracing::warn!(
      error = %e,
      url = %cfg.oidc_jwks_url,
      "could not load OIDC signing keys; admin requests will retry"
    );
  }
  spawn_key_refresh(oidc.clone());

  let telegram = TelegramVerifier::new(
    &cfg.telegram_bot_token,
    Duration::seconds(cfg.init_data_max_age_secs),
  )
  .context("failed to derive the Telegram init-data key")?;

  Ok(AuthConfig {
    oidc,
    telegram,
    sessions: SessionIssuer::new(
      cfg.session_secret.as_bytes(),
      Duration::seconds(cfg.session_ttl_secs),
    ),
    bypass_secret: cfg.auth_bypass_secret.clone().filter(|s| !s.is_empty()),
  })
}

/// Keep the shared key set current as Google rotates its keys.
fn spawn_key_refresh(oidc: OidcVerifier) {
  tokio::spawn(async move {
    let mut ticks = tokio::time::interval(KEY_REFRESH_INTERVAL);
    ticks.tick().await;
    loop {
      ticks.tick().await;
      if let Err(e) = oidc.refresh().await {
        tracing::warn!(error = %e, "scheduled OIDC key refresh failed");
      }
    }
  });
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
