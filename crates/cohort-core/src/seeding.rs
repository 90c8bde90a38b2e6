//! Test-seeding utilities used by end-to-end suites.
//!
//! Both helpers are generic over [`Store`] so they run against any backend.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
  Error,
  group::{Group, GroupStatus, MAX_GROUP_SIZE, NewGroup},
  store::Store,
};

/// How far in the past a seeded group's `created_at` is placed.
pub const TEST_GROUP_AGE_DAYS: i64 = 14;

/// Region used when the seed participant has none.
pub const UNKNOWN_REGION: &str = "unknown";

/// Build a backdated, completed group around `participant_id` plus the three
/// earliest-registered other participants.
///
/// Fails with `ParticipantNotFound` if the participant does not exist and
/// with `InsufficientData` if fewer than three others exist.
pub async fn create_test_group<S: Store>(
  store: &S,
  participant_id: Uuid,
) -> Result<Group, S::Error> {
  let participant = store
    .get_participant(participant_id)
    .await?
    .ok_or(Error::ParticipantNotFound(participant_id))?;

  let others: Vec<Uuid> = store
    .list_participants()
    .await?
    .into_iter()
    .map(|p| p.participant_id)
    .filter(|id| *id != participant_id)
    .take(MAX_GROUP_SIZE - 1)
    .collect();

  if others.len() < MAX_GROUP_SIZE - 1 {
    return Err(
      Error::InsufficientData(format!(
        "need {} other participants to build a test group, found {}",
        MAX_GROUP_SIZE - 1,
        others.len()
      ))
      .into(),
    );
  }

  let mut members = Vec::with_capacity(MAX_GROUP_SIZE);
  members.push(participant_id);
  members.extend(others);

  store
    .create_group(NewGroup {
      participants: members,
      status:       GroupStatus::Completed,
      region:       participant
        .region
        .unwrap_or_else(|| UNKNOWN_REGION.to_owned()),
      created_at:   Some(Utc::now() - Duration::days(TEST_GROUP_AGE_DAYS)),
    })
    .await
}

/// Delete all feedback of the participant with `telegram_id` and return the
/// number of rows removed.
///
/// Fails with `TelegramIdNotFound` if no participant has that key.
pub async fn delete_feedback_for_participant<S: Store>(
  store: &S,
  telegram_id: i64,
) -> Result<u64, S::Error> {
  let participant = store
    .find_participant_by_telegram_id(telegram_id)
    .await?
    .ok_or(Error::TelegramIdNotFound(telegram_id))?;

  store
    .delete_feedback_for_participant(participant.participant_id)
    .await
}
