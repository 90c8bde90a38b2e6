//! Google OpenID Connect ID-token verification for the admin console.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
  time::{Duration, Instant},
};

use jsonwebtoken::{
  Algorithm, DecodingKey, Validation,
  jwk::{AlgorithmParameters, JwkSet},
};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Issuers Google uses in the `iss` claim.
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Google's published signing keys.
pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Claims read from a Google ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
  pub sub:            String,
  pub iss:            String,
  pub aud:            String,
  pub exp:            i64,
  #[serde(default)]
  pub email:          Option<String>,
  #[serde(default)]
  pub email_verified: Option<bool>,
  /// Hosted (Workspace) domain of the account.
  #[serde(default)]
  pub hd:             Option<String>,
  #[serde(default)]
  pub name:           Option<String>,
}

/// A verified admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminIdentity {
  pub subject: String,
  pub email:   Option<String>,
  pub name:    Option<String>,
}

impl AdminIdentity {
  /// Best human-readable label: name, then email, then subject.
  pub fn display_name(&self) -> &str {
    self
      .name
      .as_deref()
      .or(self.email.as_deref())
      .unwrap_or(&self.subject)
  }
}

/// Fetch a JWKS document (e.g. [`GOOGLE_JWKS_URL`]).
pub async fn fetch_jwks(client: &reqwest::Client, url: &str) -> reqwest::Result<JwkSet> {
  client.get(url).send().await?.error_for_status()?.json().await
}

/// Minimum spacing between fetches triggered by an unknown `kid`.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

type KeyMap = HashMap<String, (DecodingKey, Algorithm)>;

/// Where to re-fetch signing keys from.
struct KeySource {
  client:     reqwest::Client,
  url:        String,
  last_fetch: Mutex<Option<Instant>>,
}

impl KeySource {
  /// Claim the next fetch slot if [`MIN_REFRESH_INTERVAL`] has passed.
  fn claim(&self) -> bool {
    let mut last = self.last_fetch.lock().unwrap_or_else(PoisonError::into_inner);
    if last.is_some_and(|at| at.elapsed() < MIN_REFRESH_INTERVAL) {
      return false;
    }
    *last = Some(Instant::now());
    true
  }
}

/// Verifies ID tokens for one OIDC client (application) id.
///
/// Clones share one key set, so a refresh through any clone is seen by all.
#[derive(Clone)]
pub struct OidcVerifier {
  audience:       String,
  issuers:        Vec<String>,
  keys:           Arc<RwLock<KeyMap>>,
  source:         Option<Arc<KeySource>>,
  allowed_domain: Option<String>,
  allowed_emails: Vec<String>,
}

fn rsa_keys(jwks: &JwkSet) -> Result<KeyMap, AuthError> {
  let mut keys = HashMap::new();
  for jwk in &jwks.keys {
    if !matches!(jwk.algorithm, AlgorithmParameters::RSA(_)) {
      continue;
    }
    let Some(kid) = jwk.common.key_id.clone() else { continue };
    keys.insert(kid, (DecodingKey::from_jwk(jwk)?, Algorithm::RS256));
  }
  Ok(keys)
}

impl OidcVerifier {
  /// A verifier for Google-issued tokens with no keys loaded yet.
  pub fn new(audience: impl Into<String>) -> Self {
    Self {
      audience:       audience.into(),
      issuers:        GOOGLE_ISSUERS.iter().map(|s| (*s).to_owned()).collect(),
      keys:           Arc::default(),
      source:         None,
      allowed_domain: None,
      allowed_emails: Vec::new(),
    }
  }

  pub fn with_key(self, kid: impl Into<String>, key: DecodingKey, alg: Algorithm) -> Self {
    self.insert_key(kid, key, alg);
    self
  }

  /// Load every RSA key with a `kid` from `jwks` as RS256.
  pub fn with_jwks(self, jwks: &JwkSet) -> Result<Self, AuthError> {
    let keys = rsa_keys(jwks)?;
    self.write_keys().extend(keys);
    Ok(self)
  }

  /// Re-fetch keys from `url` on [`refresh`](Self::refresh) and whenever a
  /// token names a `kid` we do not hold.
  pub fn with_source(mut self, client: reqwest::Client, url: impl Into<String>) -> Self {
    self.source = Some(Arc::new(KeySource {
      client,
      url: url.into(),
      last_fetch: Mutex::new(None),
    }));
    self
  }

  /// Only accept accounts of this hosted domain (`hd` claim).
  pub fn restrict_domain(mut self, domain: Option<String>) -> Self {
    self.allowed_domain = domain;
    self
  }

  /// Only accept these verified email addresses; empty means any.
  pub fn restrict_emails(mut self, emails: Vec<String>) -> Self {
    self.allowed_emails = emails;
    self
  }

  pub fn key_count(&self) -> usize { self.read_keys().len() }

  fn read_keys(&self) -> RwLockReadGuard<'_, KeyMap> {
    self.keys.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write_keys(&self) -> RwLockWriteGuard<'_, KeyMap> {
    self.keys.write().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn insert_key(&self, kid: impl Into<String>, key: DecodingKey, alg: Algorithm) {
    self.write_keys().insert(kid.into(), (key, alg));
  }

  /// Swap in the RSA keys of `jwks`, dropping keys Google has rotated out.
  /// Returns the number of keys now held.
  pub fn replace_keys(&self, jwks: &JwkSet) -> Result<usize, AuthError> {
    let fresh = rsa_keys(jwks)?;
    let count = fresh.len();
    *self.write_keys() = fresh;
    Ok(count)
  }

  /// Fetch the key source and replace the held keys.
  pub async fn refresh(&self) -> Result<usize, AuthError> {
    let source = self.source.as_ref().ok_or(AuthError::NoKeySource)?;
    let jwks = fetch_jwks(&source.client, &source.url)
      .await
      .map_err(|e| AuthError::KeyFetch(e.to_string()))?;
    let count = self.replace_keys(&jwks)?;
    tracing::info!(keys = count, url = %source.url, "refreshed OIDC signing keys");
    Ok(count)
  }

  /// [`verify`](Self::verify), refreshing the keys once when the token names
  /// an unknown `kid`. Refreshes are spaced by [`MIN_REFRESH_INTERVAL`].
  pub async fn verify_fresh(&self, token: &str) -> Result<AdminIdentity, AuthError> {
    match self.verify(token) {
      Err(AuthError::UnknownKey) if self.source.as_ref().is_some_and(|s| s.claim()) => {
        if let Err(e) = self.refresh().await {
          tracing::warn!(error = %e, "OIDC key refresh failed");
        }
        self.verify(token)
      }
      other => other,
    }
  }

  pub fn verify(&self, token: &str) -> Result<AdminIdentity, AuthError> {
    let header = jsonwebtoken::decode_header(token)?;
    let kid = header.kid.ok_or(AuthError::UnknownKey)?;
    let keys = self.read_keys();
    let (key, alg) = keys.get(&kid).ok_or(AuthError::UnknownKey)?;
    if header.alg != *alg {
      return Err(AuthError::InvalidToken(format!("unexpected algorithm {:?}", header.alg)));
    }

    let mut validation = Validation::new(*alg);
    validation.set_audience(&[&self.audience]);
    validation.set_issuer(&self.issuers[..]);
    let claims = jsonwebtoken::decode::<IdTokenClaims>(token, key, &validation)?.claims;
    drop(keys);

    if let Some(domain) = &self.allowed_domain
      && claims.hd.as_deref() != Some(domain.as_str())
    {
      return Err(AuthError::Untrusted(format!("account is not in {domain}")));
    }
    if !self.allowed_emails.is_empty() {
      let verified = claims.email_verified.unwrap_or(false);
      let listed = claims
        .email
        .as_ref()
        .is_some_and(|e| self.allowed_emails.iter().any(|a| a.eq_ignore_ascii_case(e)));
      if !(verified && listed) {
        return Err(AuthError::Untrusted("email is not an admin".into()));
      }
    }

    Ok(AdminIdentity { subject: claims.sub, email: claims.email, name: claims.name })
  }
}
