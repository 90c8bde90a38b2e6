//! Participants (Telegram users) and the feedback they leave.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A mini-app user, keyed externally by their Telegram id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
  pub participant_id: Uuid,
  /// Unique external key.
  pub telegram_id:    i64,
  pub first_name:     String,
  pub last_name:      Option<String>,
  pub username:       Option<String>,
  pub region:         Option<String>,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::store::Store::upsert_participant`].
///
/// Profile fields overwrite the stored ones, except `region`, which is only
/// replaced when `Some`.
#[derive(Debug, Clone)]
pub struct NewParticipant {
  pub telegram_id: i64,
  pub first_name:  String,
  pub last_name:   Option<String>,
  pub username:    Option<String>,
  pub region:      Option<String>,
}

impl NewParticipant {
  pub fn new(telegram_id: i64, first_name: impl Into<String>) -> Self {
    Self {
      telegram_id,
      first_name: first_name.into(),
      last_name: None,
      username: None,
      region: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
  pub feedback_id:    Uuid,
  pub participant_id: Uuid,
  /// The group the feedback is about, if any.
  pub group_id:       Option<Uuid>,
  pub content:        String,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::store::Store::submit_feedback`].
#[derive(Debug, Clone)]
pub struct NewFeedback {
  pub participant_id: Uuid,
  pub group_id:       Option<Uuid>,
  pub content:        String,
}
