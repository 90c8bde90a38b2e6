//! Comments attached to seasons and tasks.
//!
//! Comments are append-only: once written a comment is never edited, only
//! deleted. The parent entity must exist when the comment is inserted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// The entity a comment hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CommentParent {
  Season(Uuid),
  Task(Uuid),
}

impl CommentParent {
  pub fn id(&self) -> Uuid {
    match self {
      Self::Season(id) | Self::Task(id) => *id,
    }
  }

  /// The error raised when this parent does not exist.
  pub fn not_found(&self) -> Error {
    match self {
      Self::Season(id) => Error::SeasonNotFound(*id),
      Self::Task(id) => Error::TaskNotFound(*id),
    }
  }
}

impl fmt::Display for CommentParent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Season(id) => write!(f, "season/{id}"),
      Self::Task(id) => write!(f, "task/{id}"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub comment_id:  Uuid,
  pub parent:      CommentParent,
  /// Stable identity of the author (the OIDC subject for admins).
  pub author_id:   String,
  pub author_name: String,
  pub text:        String,
  /// Server-assigned; never changes after creation.
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::Store::add_comment`].
/// `created_at` is always set by the store.
#[derive(Debug, Clone)]
pub struct NewComment {
  pub parent:      CommentParent,
  pub author_id:   String,
  pub author_name: String,
  pub text:        String,
}

impl NewComment {
  /// Reject blank text before it reaches a backend.
  pub fn validate(&self) -> Result<()> {
    if self.text.trim().is_empty() {
      return Err(Error::InvalidInput("comment text is empty".into()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parent_serialises_with_kind_and_id() {
    let id = Uuid::new_v4();
    let json = serde_json::to_value(CommentParent::Task(id)).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "task", "id": id }));
  }

  #[test]
  fn blank_text_is_rejected() {
    let c = NewComment {
      parent:      CommentParent::Season(Uuid::new_v4()),
      author_id:   "admin".into(),
      author_name: "Admin".into(),
      text:        "   \n".into(),
    };
    assert!(matches!(c.validate(), Err(Error::InvalidInput(_))));
  }

  #[test]
  fn missing_parent_maps_to_matching_not_found() {
    let id = Uuid::new_v4();
    assert!(matches!(
      CommentParent::Season(id).not_found(),
      Error::SeasonNotFound(x) if x == id
    ));
    assert!(CommentParent::Task(id).not_found().is_not_found());
  }
}
