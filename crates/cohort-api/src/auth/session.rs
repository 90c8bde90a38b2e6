//! Session tokens for mini-app users who did not come through Telegram's
//! signature scheme (the test bypass path).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// `iss` claim stamped on every session token.
pub const SESSION_ISSUER: &str = "cohort";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
  /// Telegram id, as a decimal string.
  pub sub:    String,
  /// Free-form label of who asked for the session (e.g. `"playwright"`).
  pub source: String,
  pub iss:    String,
  pub iat:    i64,
  pub exp:    i64,
}

impl SessionClaims {
  pub fn telegram_id(&self) -> Result<i64, AuthError> {
    self
      .sub
      .parse()
      .map_err(|_| AuthError::InvalidToken(format!("bad subject: {:?}", self.sub)))
  }
}

/// A freshly minted token.
#[derive(Debug, Clone)]
pub struct SessionToken {
  pub token:       String,
  pub telegram_id: i64,
  pub expires_at:  DateTime<Utc>,
}

/// Mints and verifies HS256 session tokens with one shared secret.
#[derive(Clone)]
pub struct SessionIssuer {
  encoding: EncodingKey,
  decoding: DecodingKey,
  ttl:      Duration,
}

impl SessionIssuer {
  pub fn new(secret: &[u8], ttl: Duration) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
      ttl,
    }
  }

  pub fn mint(&self, telegram_id: i64, source: &str) -> Result<SessionToken, AuthError> {
    let now = Utc::now();
    let expires_at = now + self.ttl;
    let claims = SessionClaims {
      sub:    telegram_id.to_string(),
      source: source.to_owned(),
      iss:    SESSION_ISSUER.to_owned(),
      iat:    now.timestamp(),
      exp:    expires_at.timestamp(),
    };
    let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
    Ok(SessionToken { token, telegram_id, expires_at })
  }

  pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[SESSION_ISSUER]);
    let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)?;
    Ok(data.claims)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn minted_token_verifies() {
    let issuer = SessionIssuer::new(b"session-secret", Duration::hours(1));
    let minted = issuer.mint(777, "playwright").unwrap();

    let claims = issuer.verify(&minted.token).unwrap();
    assert_eq!(claims.telegram_id().unwrap(), 777);
    assert_eq!(claims.source, "playwright");
  }

  #[test]
  fn token_from_other_secret_is_rejected() {
    let a = SessionIssuer::new(b"secret-a", Duration::hours(1));
    let b = SessionIssuer::new(b"secret-b", Duration::hours(1));
    let minted = a.mint(1, "test").unwrap();
    assert!(matches!(b.verify(&minted.token), Err(AuthError::InvalidToken(_))));
  }

  #[test]
  fn expired_token_is_rejected() {
    // Well past the default 60s validation leeway.
    let issuer = SessionIssuer::new(b"s", Duration::minutes(-10));
    let minted = issuer.mint(1, "test").unwrap();
    assert!(issuer.verify(&minted.token).is_err());
  }
}
