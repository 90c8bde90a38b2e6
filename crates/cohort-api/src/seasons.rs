//! Handlers for seasons and their tasks.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/admin/seasons` | Newest first |
//! | `POST`   | `/admin/seasons` | Body: `{"name":"…","description":null}` |
//! | `GET`    | `/admin/seasons/{id}` | 404 if not found |
//! | `GET`    | `/admin/seasons/{id}/tasks` | Creation order |
//! | `POST`   | `/admin/seasons/{id}/tasks` | Body: `{"title":"…"}` |
//! | `GET`    | `/admin/tasks/{id}` | 404 if not found |
//! | `DELETE` | `/admin/tasks/{id}` | Also removes the task's comments |
//! | `GET`    | `/app/seasons` | Read-only view for mini-app users |
//! | `GET`    | `/app/seasons/{id}/tasks` | |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use cohort_core::{
  season::{NewSeason, NewTask, Season, Task},
  store::Store,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{AdminIdentity, UserIdentity},
  error::ApiError,
};

fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
  if value.trim().is_empty() {
    return Err(ApiError::BadRequest(format!("{field} must not be empty")));
  }
  Ok(())
}

// ─── Seasons ─────────────────────────────────────────────────────────────────

/// `GET /admin/seasons`
pub async fn list<S: Store + 'static>(
  _admin: AdminIdentity,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Season>>, ApiError> {
  let seasons = state.store.list_seasons().await.map_err(ApiError::from_store)?;
  Ok(Json(seasons))
}

/// `POST /admin/seasons`
pub async fn create<S: Store + 'static>(
  admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Json(body): Json<NewSeason>,
) -> Result<impl IntoResponse, ApiError> {
  require_text("name", &body.name)?;
  let season = state.store.create_season(body).await.map_err(ApiError::from_store)?;
  tracing::info!(season_id = %season.season_id, admin = %admin.subject, "season created");
  Ok((StatusCode::CREATED, Json(season)))
}

/// `GET /admin/seasons/{id}`
pub async fn get_one<S: Store + 'static>(
  _admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Season>, ApiError> {
  let season = state
    .store
    .get_season(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("season {id} not found")))?;
  Ok(Json(season))
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

async fn tasks_of<S: Store>(store: &S, season_id: Uuid) -> Result<Vec<Task>, ApiError> {
  // An empty list is ambiguous; make a missing season a 404.
  store
    .get_season(season_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("season {season_id} not found")))?;
  store.list_tasks(season_id).await.map_err(ApiError::from_store)
}

/// `GET /admin/seasons/{id}/tasks`
pub async fn list_tasks<S: Store + 'static>(
  _admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Path(season_id): Path<Uuid>,
) -> Result<Json<Vec<Task>>, ApiError> {
  Ok(Json(tasks_of(state.store.as_ref(), season_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskBody {
  pub title:       String,
  #[serde(default)]
  pub description: Option<String>,
}

/// `POST /admin/seasons/{id}/tasks`
pub async fn create_task<S: Store + 'static>(
  _admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Path(season_id): Path<Uuid>,
  Json(body): Json<CreateTaskBody>,
) -> Result<impl IntoResponse, ApiError> {
  require_text("title", &body.title)?;
  let task = state
    .store
    .create_task(NewTask { season_id, title: body.title, description: body.description })
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(%season_id, task_id = %task.task_id, "task created");
  Ok((StatusCode::CREATED, Json(task)))
}

/// `GET /admin/tasks/{id}`
pub async fn get_task<S: Store + 'static>(
  _admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
  let task = state
    .store
    .get_task(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("task {id} not found")))?;
  Ok(Json(task))
}

/// `DELETE /admin/tasks/{id}`
pub async fn delete_task<S: Store + 'static>(
  _admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
  let task = state.store.delete_task(id).await.map_err(ApiError::from_store)?;
  tracing::info!(task_id = %id, "task deleted");
  Ok(Json(task))
}

// ─── Mini-app views ──────────────────────────────────────────────────────────

/// `GET /app/seasons`
pub async fn app_list<S: Store + 'static>(
  _user: UserIdentity,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Season>>, ApiError> {
  let seasons = state.store.list_seasons().await.map_err(ApiError::from_store)?;
  Ok(Json(seasons))
}

/// `GET /app/seasons/{id}/tasks`
pub async fn app_tasks<S: Store + 'static>(
  _user: UserIdentity,
  State(state): State<AppState<S>>,
  Path(season_id): Path<Uuid>,
) -> Result<Json<Vec<Task>>, ApiError> {
  Ok(Json(tasks_of(state.store.as_ref(), season_id).await?))
}
