//! The `Store` trait and its error contract.
//!
//! The trait is implemented by storage backends (e.g. `cohort-store-sqlite`).
//! Higher layers (`cohort-api`, the seeding utilities) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
  comment::{Comment, CommentParent, NewComment},
  events::ChangeEvent,
  group::{Group, GroupStatus, NewGroup},
  participant::{Feedback, NewFeedback, NewParticipant, Participant},
  season::{NewSeason, NewTask, Season, Task},
};

// ─── Error contract ──────────────────────────────────────────────────────────

/// Error type of a [`Store`] backend.
///
/// Backends wrap domain failures ([`crate::Error`]) alongside their own
/// (I/O, decoding, ...). Callers that need to classify a failure (e.g. to
/// pick an HTTP status) look through [`StoreError::domain`].
pub trait StoreError:
  std::error::Error + From<crate::Error> + Send + Sync + 'static
{
  /// The domain error carried by this backend error, if any.
  fn domain(&self) -> Option<&crate::Error>;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Cohort document store.
///
/// Every mutation is all-or-nothing: existence checks and writes happen in a
/// single transaction, and a [`ChangeEvent`] is published only after commit.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait Store: Send + Sync {
  type Error: StoreError;

  // ── Seasons & tasks ───────────────────────────────────────────────────

  fn create_season(
    &self,
    input: NewSeason,
  ) -> impl Future<Output = Result<Season, Self::Error>> + Send + '_;

  fn get_season(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Season>, Self::Error>> + Send + '_;

  /// All seasons, newest first.
  fn list_seasons(
    &self,
  ) -> impl Future<Output = Result<Vec<Season>, Self::Error>> + Send + '_;

  /// Fails with `SeasonNotFound` if the season does not exist.
  fn create_task(
    &self,
    input: NewTask,
  ) -> impl Future<Output = Result<Task, Self::Error>> + Send + '_;

  fn get_task(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Task>, Self::Error>> + Send + '_;

  /// Tasks of a season in creation order.
  fn list_tasks(
    &self,
    season_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Task>, Self::Error>> + Send + '_;

  /// Delete a task and every comment attached to it.
  fn delete_task(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Task, Self::Error>> + Send + '_;

  // ── Comments ──────────────────────────────────────────────────────────

  /// Insert a comment. Fails with the parent's not-found error if the season
  /// or task does not exist. `created_at` is set by the store.
  fn add_comment(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  /// Remove a comment unconditionally and return it. Fails with
  /// `CommentNotFound` if absent.
  fn delete_comment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  /// Comments on `parent` in ascending creation order.
  fn list_comments(
    &self,
    parent: CommentParent,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + '_;

  // ── Participants & feedback ───────────────────────────────────────────

  /// Insert or refresh the participant keyed by `input.telegram_id`.
  fn upsert_participant(
    &self,
    input: NewParticipant,
  ) -> impl Future<Output = Result<Participant, Self::Error>> + Send + '_;

  fn get_participant(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Participant>, Self::Error>> + Send + '_;

  fn find_participant_by_telegram_id(
    &self,
    telegram_id: i64,
  ) -> impl Future<Output = Result<Option<Participant>, Self::Error>> + Send + '_;

  /// All participants in registration order.
  fn list_participants(
    &self,
  ) -> impl Future<Output = Result<Vec<Participant>, Self::Error>> + Send + '_;

  /// Fails with `ParticipantNotFound` / `GroupNotFound` on dangling
  /// references.
  fn submit_feedback(
    &self,
    input: NewFeedback,
  ) -> impl Future<Output = Result<Feedback, Self::Error>> + Send + '_;

  /// Feedback owned by a participant, in creation order.
  fn list_feedback(
    &self,
    participant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Feedback>, Self::Error>> + Send + '_;

  /// Delete all feedback owned by a participant and return how many rows
  /// were removed.
  fn delete_feedback_for_participant(
    &self,
    participant_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Groups ────────────────────────────────────────────────────────────

  /// Fails with `InvalidGroup` on a bad member list and
  /// `ParticipantNotFound` if any member does not exist.
  fn create_group(
    &self,
    input: NewGroup,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + '_;

  fn get_group(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + '_;

  /// All groups, newest first.
  fn list_groups(
    &self,
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + '_;

  /// Groups that `participant_id` belongs to, newest first.
  fn list_groups_for_participant(
    &self,
    participant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + '_;

  fn set_group_status(
    &self,
    id: Uuid,
    status: GroupStatus,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + '_;

  // ── Change feed ───────────────────────────────────────────────────────

  /// Subscribe to events for every mutation committed after this call.
  fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}
