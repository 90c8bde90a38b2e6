//! Validation of Telegram mini-app init data.
//!
//! Telegram hands the mini-app a URL-encoded query string signed with a key
//! derived from the bot token:
//!
//! ```text
//! secret_key = HMAC_SHA256(key = "WebAppData", msg = bot_token)
//! hash       = hex(HMAC_SHA256(key = secret_key, msg = data_check_string))
//! ```
//!
//! where `data_check_string` is every field except `hash`, decoded, sorted by
//! key and joined as `key=value` lines.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq as _;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";

/// How far ahead of our clock an `auth_date` may be.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// The `user` object embedded in init data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramProfile {
  pub id:            i64,
  pub first_name:    String,
  #[serde(default)]
  pub last_name:     Option<String>,
  #[serde(default)]
  pub username:      Option<String>,
  #[serde(default)]
  pub language_code: Option<String>,
}

/// Verified init data.
#[derive(Debug, Clone)]
pub struct InitData {
  pub user:      TelegramProfile,
  pub auth_date: DateTime<Utc>,
  pub query_id:  Option<String>,
}

fn hmac_sha256(key: &[u8], msg: &[u8]) -> Result<Vec<u8>, AuthError> {
  let mut mac = HmacSha256::new_from_slice(key)
    .map_err(|e| AuthError::Malformed(format!("hmac key: {e}")))?;
  mac.update(msg);
  Ok(mac.finalize().into_bytes().to_vec())
}

fn decode_component(s: &str) -> Result<String, AuthError> {
  let plus_as_space = s.replace('+', " ");
  urlencoding::decode(&plus_as_space)
    .map(|c| c.into_owned())
    .map_err(|_| AuthError::Malformed("init data is not valid UTF-8".into()))
}

fn parse_fields(raw: &str) -> Result<BTreeMap<String, String>, AuthError> {
  let mut fields = BTreeMap::new();
  for part in raw.split('&').filter(|p| !p.is_empty()) {
    let (k, v) = part
      .split_once('=')
      .ok_or_else(|| AuthError::Malformed(format!("field without value: {part:?}")))?;
    fields.insert(decode_component(k)?, decode_component(v)?);
  }
  Ok(fields)
}

fn data_check_string(fields: &BTreeMap<String, String>) -> String {
  fields
    .iter()
    .filter(|(k, _)| k.as_str() != "hash")
    .map(|(k, v)| format!("{k}={v}"))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Verifies init data against one bot token.
#[derive(Clone)]
pub struct TelegramVerifier {
  secret_key: Vec<u8>,
  max_age:    Duration,
}

impl TelegramVerifier {
  pub fn new(bot_token: &str, max_age: Duration) -> Result<Self, AuthError> {
    Ok(Self {
      secret_key: hmac_sha256(WEB_APP_DATA_KEY, bot_token.as_bytes())?,
      max_age,
    })
  }

  pub fn verify(&self, raw: &str) -> Result<InitData, AuthError> {
    self.verify_at(raw, Utc::now())
  }

  /// Verify `raw` as of `now`.
  pub fn verify_at(&self, raw: &str, now: DateTime<Utc>) -> Result<InitData, AuthError> {
    let fields = parse_fields(raw)?;

    let supplied = fields.get("hash").ok_or(AuthError::MissingHash)?;
    let supplied = hex::decode(supplied).map_err(|_| AuthError::BadSignature)?;
    let computed = hmac_sha256(&self.secret_key, data_check_string(&fields).as_bytes())?;
    if !bool::from(supplied.as_slice().ct_eq(computed.as_slice())) {
      return Err(AuthError::BadSignature);
    }

    let auth_date = fields
      .get("auth_date")
      .and_then(|s| s.parse::<i64>().ok())
      .and_then(|secs| DateTime::from_timestamp(secs, 0))
      .ok_or_else(|| AuthError::Malformed("missing or invalid auth_date".into()))?;
    if auth_date - now > Duration::seconds(MAX_CLOCK_SKEW_SECS) {
      return Err(AuthError::FutureDated);
    }
    if now - auth_date > self.max_age {
      return Err(AuthError::Expired);
    }

    let user = fields
      .get("user")
      .ok_or_else(|| AuthError::Malformed("missing user".into()))?;
    let user: TelegramProfile = serde_json::from_str(user)
      .map_err(|e| AuthError::Malformed(format!("user: {e}")))?;

    Ok(InitData { user, auth_date, query_id: fields.get("query_id").cloned() })
  }

  /// Produce a signed init-data string for `fields`, as Telegram would.
  pub fn sign(&self, fields: &[(&str, &str)]) -> Result<String, AuthError> {
    let map: BTreeMap<String, String> = fields
      .iter()
      .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
      .collect();
    let hash = hex::encode(hmac_sha256(&self.secret_key, data_check_string(&map).as_bytes())?);

    let mut out: Vec<String> = map
      .iter()
      .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
      .collect();
    out.push(format!("hash={hash}"));
    Ok(out.join("&"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const USER: &str = r#"{"id":4242,"first_name":"Ann","username":"ann_tg"}"#;

  fn verifier() -> TelegramVerifier {
    TelegramVerifier::new("123456:bot-token", Duration::hours(24)).unwrap()
  }

  fn signed(v: &TelegramVerifier, auth_date: i64) -> String {
    let auth_date = auth_date.to_string();
    v.sign(&[
      ("auth_date", auth_date.as_str()),
      ("query_id", "AAE1"),
      ("user", USER),
    ])
    .unwrap()
  }

  #[test]
  fn accepts_correctly_signed_data() {
    let v = verifier();
    let now = Utc::now();
    let data = v.verify_at(&signed(&v, now.timestamp()), now).unwrap();
    assert_eq!(data.user.id, 4242);
    assert_eq!(data.user.username.as_deref(), Some("ann_tg"));
    assert_eq!(data.query_id.as_deref(), Some("AAE1"));
  }

  #[test]
  fn field_order_in_query_string_is_irrelevant() {
    let v = verifier();
    let now = Utc::now();
    let raw = signed(&v, now.timestamp());
    let mut parts: Vec<&str> = raw.split('&').collect();
    parts.reverse();
    assert!(v.verify_at(&parts.join("&"), now).is_ok());
  }

  #[test]
  fn rejects_tampered_field() {
    let v = verifier();
    let now = Utc::now();
    let raw = signed(&v, now.timestamp()).replace("AAE1", "AAE2");
    assert!(matches!(v.verify_at(&raw, now), Err(AuthError::BadSignature)));
  }

  #[test]
  fn rejects_other_bot_signature() {
    let other = TelegramVerifier::new("999:other", Duration::hours(24)).unwrap();
    let now = Utc::now();
    let raw = signed(&other, now.timestamp());
    assert!(matches!(verifier().verify_at(&raw, now), Err(AuthError::BadSignature)));
  }

  #[test]
  fn rejects_missing_hash() {
    let now = Utc::now();
    let raw = format!("auth_date={}&user={}", now.timestamp(), urlencoding::encode(USER));
    assert!(matches!(verifier().verify_at(&raw, now), Err(AuthError::MissingHash)));
  }

  #[test]
  fn rejects_expired_data() {
    let v = verifier();
    let now = Utc::now();
    let old = (now - Duration::hours(25)).timestamp();
    assert!(matches!(v.verify_at(&signed(&v, old), now), Err(AuthError::Expired)));
  }

  #[test]
  fn rejects_auth_date_from_the_future() {
    let v = verifier();
    let now = Utc::now();
    let ahead = (now + Duration::hours(2)).timestamp();
    assert!(matches!(v.verify_at(&signed(&v, ahead), now), Err(AuthError::FutureDated)));

    let slight = (now + Duration::seconds(MAX_CLOCK_SKEW_SECS / 2)).timestamp();
    assert!(v.verify_at(&signed(&v, slight), now).is_ok());
  }

  #[test]
  fn rejects_garbage() {
    assert!(matches!(
      verifier().verify_at("not-a-query-string", Utc::now()),
      Err(AuthError::Malformed(_))
    ));
  }
}
