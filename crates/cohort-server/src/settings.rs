//! Server configuration.
//!
//! Layered, lowest precedence first:
//!
//! 1. the TOML file passed with `--config` (optional),
//! 2. `COHORT_*` environment variables (`COHORT_PORT=8080`, ...),
//! 3. `AUTH_BYPASS_SECRET`, which sets `auth_bypass_secret`.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use serde::Deserialize;

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_jwks_url() -> String { cohort_api::auth::oidc::GOOGLE_JWKS_URL.to_owned() }

fn default_init_data_max_age() -> i64 { 86_400 }

fn default_session_ttl() -> i64 { 12 * 3_600 }

/// Runtime server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  pub store_path:             PathBuf,

  /// OAuth client id the admin console's ID tokens are issued to.
  pub oidc_client_id:         String,
  #[serde(default = "default_jwks_url")]
  pub oidc_jwks_url:          String,
  /// Google Workspace domain admins must belong to.
  #[serde(default)]
  pub admin_domain:           Option<String>,
  #[serde(default)]
  pub admin_emails:           Vec<String>,

  pub telegram_bot_token:     String,
  #[serde(default = "default_init_data_max_age")]
  pub init_data_max_age_secs: i64,

  pub session_secret:         String,
  #[serde(default = "default_session_ttl")]
  pub session_ttl_secs:       i64,

  /// Enables `/http/*` when set and non-empty.
  #[serde(default)]
  pub auth_bypass_secret:     Option<String>,
}

impl ServerConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("COHORT")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("admin_emails"),
      )
      .set_override_option("auth_bypass_secret", std::env::var("AUTH_BYPASS_SECRET").ok())
      .context("failed to apply AUTH_BYPASS_SECRET")?
      .build()
      .context("failed to read configuration")?;

    let cfg: ServerConfig = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.validate()?;
    Ok(cfg)
  }

  fn validate(&self) -> anyhow::Result<()> {
    if self.session_secret.len() < 16 {
      bail!("session_secret must be at least 16 bytes");
    }
    if self.telegram_bot_token.is_empty() {
      bail!("telegram_bot_token must be set");
    }
    if self.init_data_max_age_secs <= 0 || self.session_ttl_secs <= 0 {
      bail!("init_data_max_age_secs and session_ttl_secs must be positive");
    }
    Ok(())
  }

  /// `true` when the bypass and testing endpoints are reachable.
  pub fn bypass_enabled(&self) -> bool {
    self.auth_bypass_secret.as_deref().is_some_and(|s| !s.is_empty())
  }
}
