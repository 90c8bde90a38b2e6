//! Secret-gated endpoints used by automated end-to-end suites.
//!
//! Every body carries the bypass secret; a missing server-side secret or a
//! mismatch yields `401`.
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `POST` | `/http/auth/bypass-session` | `{"secret","telegramId","source"}` |
//! | `POST` | `/http/testing/groups` | `{"secret","participantId"}` |
//! | `POST` | `/http/testing/feedback/delete` | `{"secret","telegramId"}` |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use cohort_core::{seeding, store::Store};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

fn default_source() -> String { "bypass".to_owned() }

// ─── Bypass session ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BypassBody {
  pub secret:      String,
  pub telegram_id: i64,
  #[serde(default = "default_source")]
  pub source:      String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BypassResponse {
  pub token:       String,
  pub telegram_id: i64,
}

/// `POST /http/auth/bypass-session`
pub async fn bypass_session<S: Store + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<BypassBody>,
) -> Result<Json<BypassResponse>, ApiError> {
  if let Err(e) = state.auth.check_bypass_secret(&body.secret) {
    tracing::warn!(source = %body.source, error = %e, "bypass session refused");
    return Err(e.into());
  }
  let session = state.auth.sessions.mint(body.telegram_id, &body.source)?;
  tracing::info!(
    telegram_id = body.telegram_id,
    source = %body.source,
    expires_at = %session.expires_at,
    "bypass session minted"
  );
  Ok(Json(BypassResponse { token: session.token, telegram_id: session.telegram_id }))
}

// ─── Test seeding ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestGroupBody {
  pub secret:         String,
  pub participant_id: Uuid,
}

/// `POST /http/testing/groups`
pub async fn create_test_group<S: Store + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<TestGroupBody>,
) -> Result<impl IntoResponse, ApiError> {
  state.auth.check_bypass_secret(&body.secret)?;
  let group = seeding::create_test_group(state.store.as_ref(), body.participant_id)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(
    group_id = %group.group_id,
    participant_id = %body.participant_id,
    "test group seeded"
  );
  Ok((StatusCode::CREATED, Json(group)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFeedbackBody {
  pub secret:      String,
  pub telegram_id: i64,
}

#[derive(Debug, Serialize)]
pub struct DeleteFeedbackResponse {
  pub deleted: u64,
}

/// `POST /http/testing/feedback/delete`
pub async fn delete_feedback<S: Store + 'static>(
  State(state): State<AppState<S>>,
  Json(body): Json<DeleteFeedbackBody>,
) -> Result<Json<DeleteFeedbackResponse>, ApiError> {
  state.auth.check_bypass_secret(&body.secret)?;
  let deleted = seeding::delete_feedback_for_participant(state.store.as_ref(), body.telegram_id)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(telegram_id = body.telegram_id, deleted, "test feedback deleted");
  Ok(Json(DeleteFeedbackResponse { deleted }))
}
