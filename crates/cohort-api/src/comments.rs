//! Handlers for comments on seasons and tasks.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/admin/seasons/{id}/comments` | Oldest first |
//! | `POST`   | `/admin/seasons/{id}/comments` | Body: `{"text":"…"}`; 404 if the season is gone |
//! | `GET`    | `/admin/tasks/{id}/comments` | Oldest first |
//! | `POST`   | `/admin/tasks/{id}/comments` | |
//! | `DELETE` | `/admin/comments/{id}` | Returns the removed comment |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use cohort_core::{
  comment::{Comment, CommentParent, NewComment},
  store::Store,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::AdminIdentity, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct AddBody {
  /// Overrides the name taken from the admin's ID token.
  #[serde(default)]
  pub author_name: Option<String>,
  pub text:        String,
}

async fn list_for<S: Store>(
  store: &S,
  parent: CommentParent,
) -> Result<Json<Vec<Comment>>, ApiError> {
  let comments = store.list_comments(parent).await.map_err(ApiError::from_store)?;
  Ok(Json(comments))
}

async fn add_to<S: Store>(
  store: &S,
  admin: AdminIdentity,
  parent: CommentParent,
  body: AddBody,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
  let author_name = body
    .author_name
    .filter(|n| !n.trim().is_empty())
    .unwrap_or_else(|| admin.display_name().to_owned());
  let comment = store
    .add_comment(NewComment {
      parent,
      author_id: admin.subject,
      author_name,
      text: body.text,
    })
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(%parent, comment_id = %comment.comment_id, "comment added");
  Ok((StatusCode::CREATED, Json(comment)))
}

/// `GET /admin/seasons/{id}/comments`
pub async fn list_for_season<S: Store + 'static>(
  _admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, ApiError> {
  list_for(state.store.as_ref(), CommentParent::Season(id)).await
}

/// `POST /admin/seasons/{id}/comments`
pub async fn add_to_season<S: Store + 'static>(
  admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AddBody>,
) -> Result<impl IntoResponse, ApiError> {
  add_to(state.store.as_ref(), admin, CommentParent::Season(id), body).await
}

/// `GET /admin/tasks/{id}/comments`
pub async fn list_for_task<S: Store + 'static>(
  _admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, ApiError> {
  list_for(state.store.as_ref(), CommentParent::Task(id)).await
}

/// `POST /admin/tasks/{id}/comments`
pub async fn add_to_task<S: Store + 'static>(
  admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AddBody>,
) -> Result<impl IntoResponse, ApiError> {
  add_to(state.store.as_ref(), admin, CommentParent::Task(id), body).await
}

/// `DELETE /admin/comments/{id}`
pub async fn delete_one<S: Store + 'static>(
  admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Comment>, ApiError> {
  let comment = state.store.delete_comment(id).await.map_err(ApiError::from_store)?;
  tracing::info!(comment_id = %id, admin = %admin.subject, "comment deleted");
  Ok(Json(comment))
}
