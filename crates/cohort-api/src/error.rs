//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use cohort_core::{Error as CoreError, store::StoreError};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized: {0}")]
  Unauthorized(#[from] AuthError),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("insufficient data: {0}")]
  InsufficientData(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error by the domain error it carries.
  pub fn from_store<E: StoreError>(e: E) -> Self {
    let message = e.to_string();
    match e.domain() {
      Some(d) if d.is_not_found() => return Self::NotFound(message),
      Some(CoreError::InsufficientData(_)) => {
        return Self::InsufficientData(message);
      }
      Some(CoreError::InvalidGroup(_) | CoreError::InvalidInput(_)) => {
        return Self::BadRequest(message);
      }
      _ => {}
    }
    Self::Store(Box::new(e))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized(e) => (StatusCode::UNAUTHORIZED, e.to_string()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::InsufficientData(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    res
  }
}
