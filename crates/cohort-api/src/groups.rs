//! Handlers for participant groups.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/admin/groups` | Newest first |
//! | `POST` | `/admin/groups` | Body: `{"participants":[…],"region":"…"}` |
//! | `PUT`  | `/admin/groups/{id}/status` | Body: `{"status":"completed"}` |
//! | `GET`  | `/app/groups` | Groups the caller belongs to |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use cohort_core::{
  group::{Group, GroupStatus, NewGroup},
  store::Store,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{AdminIdentity, UserIdentity},
  error::ApiError,
  participants,
};

/// `GET /admin/groups`
pub async fn list<S: Store + 'static>(
  _admin: AdminIdentity,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Group>>, ApiError> {
  let groups = state.store.list_groups().await.map_err(ApiError::from_store)?;
  Ok(Json(groups))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub participants: Vec<Uuid>,
  pub region:       String,
  #[serde(default)]
  pub status:       GroupStatus,
}

/// `POST /admin/groups`
pub async fn create<S: Store + 'static>(
  _admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let input = NewGroup {
    status: body.status,
    ..NewGroup::new(body.participants, body.region)
  };
  let group = state.store.create_group(input).await.map_err(ApiError::from_store)?;
  tracing::info!(
    group_id = %group.group_id,
    size = group.participants.len(),
    region = %group.region,
    "group created"
  );
  Ok((StatusCode::CREATED, Json(group)))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: GroupStatus,
}

/// `PUT /admin/groups/{id}/status`
pub async fn set_status<S: Store + 'static>(
  _admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Group>, ApiError> {
  let group = state
    .store
    .set_group_status(id, body.status)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(group_id = %id, status = %group.status, "group status changed");
  Ok(Json(group))
}

/// `GET /app/groups`
pub async fn mine<S: Store + 'static>(
  user: UserIdentity,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Group>>, ApiError> {
  let me = participants::resolve(state.store.as_ref(), &user).await?;
  let groups = state
    .store
    .list_groups_for_participant(me.participant_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(groups))
}
