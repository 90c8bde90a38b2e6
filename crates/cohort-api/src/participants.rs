//! Handlers for participants and their feedback.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/admin/participants` | Registration order |
//! | `GET`  | `/admin/participants/{id}/feedback` | 404 if the participant is unknown |
//! | `GET`  | `/app/me` | Registers or refreshes the caller |
//! | `GET`  | `/app/feedback` | The caller's feedback |
//! | `POST` | `/app/feedback` | Body: `{"content":"…","group_id":null}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use cohort_core::{
  participant::{Feedback, NewFeedback, NewParticipant, Participant},
  store::Store,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{AdminIdentity, Credential, TelegramProfile, UserIdentity},
  error::ApiError,
};

/// First name given to callers known only by a session token.
pub const PLACEHOLDER_NAME: &str = "Telegram user";

/// Whether `stored` already carries everything `profile` says.
fn profile_unchanged(stored: &Participant, profile: &TelegramProfile) -> bool {
  stored.first_name == profile.first_name
    && stored.last_name == profile.last_name
    && stored.username == profile.username
}

/// Map the caller onto a stored participant.
///
/// Init-data callers are written only when new or when their Telegram
/// profile changed, so repeated reads publish no change events. Session
/// callers carry no profile; an existing row is reused as-is and a
/// placeholder row is created otherwise.
pub(crate) async fn resolve<S: Store>(
  store: &S,
  user: &UserIdentity,
) -> Result<Participant, ApiError> {
  let existing = store
    .find_participant_by_telegram_id(user.telegram_id)
    .await
    .map_err(ApiError::from_store)?;

  match (existing, &user.profile) {
    (Some(stored), Some(profile)) if profile_unchanged(&stored, profile) => Ok(stored),
    (_, Some(profile)) => {
      let input = NewParticipant {
        telegram_id: profile.id,
        first_name:  profile.first_name.clone(),
        last_name:   profile.last_name.clone(),
        username:    profile.username.clone(),
        region:      None,
      };
      store.upsert_participant(input).await.map_err(ApiError::from_store)
    }
    (Some(stored), None) => Ok(stored),
    (None, None) => {
      let source = match &user.credential {
        Credential::Session { source } => source.as_str(),
        Credential::InitData => "init-data",
      };
      tracing::info!(
        telegram_id = user.telegram_id,
        source,
        "registering placeholder participant"
      );
      store
        .upsert_participant(NewParticipant::new(user.telegram_id, PLACEHOLDER_NAME))
        .await
        .map_err(ApiError::from_store)
    }
  }
}

// ─── Admin ───────────────────────────────────────────────────────────────────

/// `GET /admin/participants`
pub async fn list<S: Store + 'static>(
  _admin: AdminIdentity,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Participant>>, ApiError> {
  let participants = state.store.list_participants().await.map_err(ApiError::from_store)?;
  Ok(Json(participants))
}

/// `GET /admin/participants/{id}/feedback`
pub async fn feedback_for<S: Store + 'static>(
  _admin: AdminIdentity,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Feedback>>, ApiError> {
  state
    .store
    .get_participant(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("participant {id} not found")))?;
  let feedback = state.store.list_feedback(id).await.map_err(ApiError::from_store)?;
  Ok(Json(feedback))
}

// ─── Mini-app ────────────────────────────────────────────────────────────────

/// `GET /app/me`
pub async fn me<S: Store + 'static>(
  user: UserIdentity,
  State(state): State<AppState<S>>,
) -> Result<Json<Participant>, ApiError> {
  Ok(Json(resolve(state.store.as_ref(), &user).await?))
}

/// `GET /app/feedback`
pub async fn my_feedback<S: Store + 'static>(
  user: UserIdentity,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Feedback>>, ApiError> {
  let me = resolve(state.store.as_ref(), &user).await?;
  let feedback = state
    .store
    .list_feedback(me.participant_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(feedback))
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub content:  String,
  #[serde(default)]
  pub group_id: Option<Uuid>,
}

/// `POST /app/feedback`
pub async fn submit_feedback<S: Store + 'static>(
  user: UserIdentity,
  State(state): State<AppState<S>>,
  Json(body): Json<SubmitBody>,
) -> Result<impl IntoResponse, ApiError> {
  if body.content.trim().is_empty() {
    return Err(ApiError::BadRequest("content must not be empty".into()));
  }
  let me = resolve(state.store.as_ref(), &user).await?;

  if let Some(group_id) = body.group_id {
    let group = state
      .store
      .get_group(group_id)
      .await
      .map_err(ApiError::from_store)?
      .ok_or_else(|| ApiError::NotFound(format!("group {group_id} not found")))?;
    if !group.participants.contains(&me.participant_id) {
      return Err(ApiError::BadRequest(format!("not a member of group {group_id}")));
    }
  }

  let feedback = state
    .store
    .submit_feedback(NewFeedback {
      participant_id: me.participant_id,
      group_id:       body.group_id,
      content:        body.content,
    })
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(
    participant_id = %me.participant_id,
    feedback_id = %feedback.feedback_id,
    "feedback submitted"
  );
  Ok((StatusCode::CREATED, Json(feedback)))
}

#[cfg(test)]
mod tests {
  use cohort_core::events::ChangeEvent;
  use cohort_store_sqlite::SqliteStore;
  use tokio::sync::broadcast::error::TryRecvError;

  use super::*;

  fn init_data_user(username: &str) -> UserIdentity {
    UserIdentity {
      telegram_id: 321,
      profile:     Some(TelegramProfile {
        id:            321,
        first_name:    "Mila".into(),
        last_name:     None,
        username:      Some(username.into()),
        language_code: Some("en".into()),
      }),
      credential:  Credential::InitData,
    }
  }

  #[tokio::test]
  async fn repeated_init_data_reads_write_once() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let mut changes = store.subscribe();

    let first = resolve(&store, &init_data_user("mila")).await.unwrap();
    let again = resolve(&store, &init_data_user("mila")).await.unwrap();
    assert_eq!(first, again);

    assert!(matches!(changes.try_recv(), Ok(ChangeEvent::ParticipantUpserted { .. })));
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
  }

  #[tokio::test]
  async fn changed_profile_is_written() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let first = resolve(&store, &init_data_user("mila")).await.unwrap();
    let mut changes = store.subscribe();

    let renamed = resolve(&store, &init_data_user("mila_k")).await.unwrap();
    assert_eq!(renamed.participant_id, first.participant_id);
    assert_eq!(renamed.username.as_deref(), Some("mila_k"));
    assert!(matches!(changes.try_recv(), Ok(ChangeEvent::ParticipantUpserted { .. })));
  }

  #[tokio::test]
  async fn session_caller_gets_a_placeholder_once() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let user = UserIdentity {
      telegram_id: 9,
      profile:     None,
      credential:  Credential::Session { source: "tests".into() },
    };

    let created = resolve(&store, &user).await.unwrap();
    assert_eq!(created.first_name, PLACEHOLDER_NAME);
    let mut changes = store.subscribe();
    assert_eq!(resolve(&store, &user).await.unwrap(), created);
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
  }
}
