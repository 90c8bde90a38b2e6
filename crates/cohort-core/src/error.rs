//! Error types for `cohort-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("season not found: {0}")]
  SeasonNotFound(Uuid),

  #[error("task not found: {0}")]
  TaskNotFound(Uuid),

  #[error("comment not found: {0}")]
  CommentNotFound(Uuid),

  #[error("participant not found: {0}")]
  ParticipantNotFound(Uuid),

  #[error("no participant with telegram id {0}")]
  TelegramIdNotFound(i64),

  #[error("group not found: {0}")]
  GroupNotFound(Uuid),

  #[error("insufficient data: {0}")]
  InsufficientData(String),

  #[error("invalid group: {0}")]
  InvalidGroup(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),
}

impl Error {
  /// `true` for every "entity does not exist" variant.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::SeasonNotFound(_)
        | Self::TaskNotFound(_)
        | Self::CommentNotFound(_)
        | Self::ParticipantNotFound(_)
        | Self::TelegramIdNotFound(_)
        | Self::GroupNotFound(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
