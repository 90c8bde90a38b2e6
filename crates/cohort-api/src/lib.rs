//! JSON REST API for Cohort.
//!
//! Exposes an axum [`Router`] backed by any [`cohort_core::store::Store`].
//! Route groups:
//!
//! * `/http/*`: secret-gated bypass and test-seeding endpoints.
//! * `/admin/*`: the admin console, behind Google ID tokens.
//! * `/app/*`: the Telegram mini-app, behind init data or a session token.

pub mod auth;
pub mod comments;
pub mod error;
pub mod events;
pub mod groups;
pub mod http;
pub mod participants;
pub mod seasons;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use cohort_core::store::Store;
use tower_http::trace::TraceLayer;

pub use auth::AuthConfig;
pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

impl<S> AppState<S> {
  pub fn new(store: S, auth: AuthConfig) -> Self {
    Self { store: Arc::new(store), auth: Arc::new(auth) }
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), auth: Arc::clone(&self.auth) }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: Store + 'static,
{
  Router::new()
    // Bypass & test seeding
    .route("/http/auth/bypass-session", post(http::bypass_session::<S>))
    .route("/http/testing/groups", post(http::create_test_group::<S>))
    .route("/http/testing/feedback/delete", post(http::delete_feedback::<S>))
    // Admin: seasons & tasks
    .route("/admin/seasons", get(seasons::list::<S>).post(seasons::create::<S>))
    .route("/admin/seasons/{id}", get(seasons::get_one::<S>))
    .route(
      "/admin/seasons/{id}/tasks",
      get(seasons::list_tasks::<S>).post(seasons::create_task::<S>),
    )
    .route(
      "/admin/tasks/{id}",
      get(seasons::get_task::<S>).delete(seasons::delete_task::<S>),
    )
    // Admin: comments
    .route(
      "/admin/seasons/{id}/comments",
      get(comments::list_for_season::<S>).post(comments::add_to_season::<S>),
    )
    .route(
      "/admin/tasks/{id}/comments",
      get(comments::list_for_task::<S>).post(comments::add_to_task::<S>),
    )
    .route("/admin/comments/{id}", delete(comments::delete_one::<S>))
    // Admin: participants & groups
    .route("/admin/participants", get(participants::list::<S>))
    .route("/admin/participants/{id}/feedback", get(participants::feedback_for::<S>))
    .route("/admin/groups", get(groups::list::<S>).post(groups::create::<S>))
    .route("/admin/groups/{id}/status", put(groups::set_status::<S>))
    .route("/admin/events", get(events::subscribe::<S>))
    // Mini-app
    .route("/app/me", get(participants::me::<S>))
    .route("/app/seasons", get(seasons::app_list::<S>))
    .route("/app/seasons/{id}/tasks", get(seasons::app_tasks::<S>))
    .route("/app/groups", get(groups::mine::<S>))
    .route(
      "/app/feedback",
      get(participants::my_feedback::<S>).post(participants::submit_feedback::<S>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests;
