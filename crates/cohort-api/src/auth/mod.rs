//! The auth gate: who may call which route.
//!
//! * `/admin/*` requires an [`AdminIdentity`] (Google ID token).
//! * `/app/*` requires a [`UserIdentity`] (Telegram init data or a session
//!   token).
//! * `/http/*` endpoints check the shared bypass secret themselves.

pub mod oidc;
pub mod session;
pub mod telegram;

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use cohort_core::store::Store;
use subtle::ConstantTimeEq as _;
use thiserror::Error;

pub use oidc::{AdminIdentity, OidcVerifier};
pub use session::{SessionIssuer, SessionToken};
pub use telegram::{TelegramProfile, TelegramVerifier};

use crate::{AppState, error::ApiError};

/// Header carrying raw init data when `Authorization` is taken.
pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";

#[derive(Debug, Error)]
pub enum AuthError {
  #[error("missing credentials")]
  MissingCredentials,

  #[error("invalid token: {0}")]
  InvalidToken(String),

  #[error("token signed with an unknown key")]
  UnknownKey,

  #[error("no signing key source configured")]
  NoKeySource,

  #[error("could not fetch signing keys: {0}")]
  KeyFetch(String),

  #[error("identity not trusted: {0}")]
  Untrusted(String),

  #[error("init data has no hash")]
  MissingHash,

  #[error("init data signature mismatch")]
  BadSignature,

  #[error("init data expired")]
  Expired,

  #[error("init data is dated in the future")]
  FutureDated,

  #[error("malformed init data: {0}")]
  Malformed(String),

  #[error("session bypass is disabled")]
  BypassDisabled,

  #[error("bypass secret mismatch")]
  BadSecret,
}

impl From<jsonwebtoken::errors::Error> for AuthError {
  fn from(e: jsonwebtoken::errors::Error) -> Self { Self::InvalidToken(e.to_string()) }
}

/// All verifiers and secrets the gate needs.
#[derive(Clone)]
pub struct AuthConfig {
  pub oidc:          OidcVerifier,
  pub telegram:      TelegramVerifier,
  pub sessions:      SessionIssuer,
  /// `None` disables the bypass and testing endpoints entirely.
  pub bypass_secret: Option<String>,
}

impl AuthConfig {
  /// Constant-time check of a caller-supplied bypass secret.
  pub fn check_bypass_secret(&self, supplied: &str) -> Result<(), AuthError> {
    let expected = self.bypass_secret.as_deref().ok_or(AuthError::BypassDisabled)?;
    if expected.is_empty() {
      return Err(AuthError::BypassDisabled);
    }
    if bool::from(supplied.as_bytes().ct_eq(expected.as_bytes())) {
      Ok(())
    } else {
      Err(AuthError::BadSecret)
    }
  }
}

/// Split `Authorization: <scheme> <credentials>`.
fn authorization(headers: &HeaderMap) -> Option<(String, &str)> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let (scheme, rest) = value.split_once(' ')?;
  Some((scheme.to_ascii_lowercase(), rest.trim()))
}

// ─── Admin ───────────────────────────────────────────────────────────────────

impl<S> FromRequestParts<AppState<S>> for AdminIdentity
where
  S: Store + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = match authorization(&parts.headers) {
      Some((scheme, token)) if scheme == "bearer" => token,
      _ => return Err(AuthError::MissingCredentials.into()),
    };
    state.auth.oidc.verify_fresh(token).await.map_err(|e| {
      tracing::warn!(error = %e, "rejected admin credentials");
      e.into()
    })
  }
}

// ─── User ────────────────────────────────────────────────────────────────────

/// How a mini-app user proved who they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
  InitData,
  Session { source: String },
}

/// A verified mini-app user.
#[derive(Debug, Clone)]
pub struct UserIdentity {
  pub telegram_id: i64,
  /// Present when the user came through Telegram's init data.
  pub profile:     Option<TelegramProfile>,
  pub credential:  Credential,
}

impl UserIdentity {
  fn from_init_data(config: &AuthConfig, raw: &str) -> Result<Self, AuthError> {
    let data = config.telegram.verify(raw)?;
    Ok(Self {
      telegram_id: data.user.id,
      profile:     Some(data.user),
      credential:  Credential::InitData,
    })
  }

  fn from_session(config: &AuthConfig, token: &str) -> Result<Self, AuthError> {
    let claims = config.sessions.verify(token)?;
    Ok(Self {
      telegram_id: claims.telegram_id()?,
      profile:     None,
      credential:  Credential::Session { source: claims.source },
    })
  }

  /// Resolve credentials from request headers.
  pub fn from_headers(headers: &HeaderMap, config: &AuthConfig) -> Result<Self, AuthError> {
    match authorization(headers) {
      Some((scheme, raw)) if scheme == "tma" => return Self::from_init_data(config, raw),
      Some((scheme, token)) if scheme == "bearer" => {
        return Self::from_session(config, token);
      }
      _ => {}
    }
    let raw = headers
      .get(INIT_DATA_HEADER)
      .and_then(|v| v.to_str().ok())
      .ok_or(AuthError::MissingCredentials)?;
    Self::from_init_data(config, raw)
  }
}

impl<S> FromRequestParts<AppState<S>> for UserIdentity
where
  S: Store + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    UserIdentity::from_headers(&parts.headers, &state.auth).map_err(|e| {
      tracing::warn!(error = %e, "rejected mini-app credentials");
      e.into()
    })
  }
}
