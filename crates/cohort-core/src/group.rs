//! Groups: small teams of participants working through a season.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// Smallest and largest permitted group sizes.
pub const MIN_GROUP_SIZE: usize = 1;
pub const MAX_GROUP_SIZE: usize = 4;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GroupStatus {
  #[default]
  Active,
  Completed,
  Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub group_id:     Uuid,
  /// Member participant ids, in the order they were given at creation.
  pub participants: Vec<Uuid>,
  pub status:       GroupStatus,
  pub region:       String,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::Store::create_group`].
#[derive(Debug, Clone)]
pub struct NewGroup {
  pub participants: Vec<Uuid>,
  pub status:       GroupStatus,
  pub region:       String,
  /// Defaults to now. Seeding utilities backdate groups through this.
  pub created_at:   Option<DateTime<Utc>>,
}

impl NewGroup {
  pub fn new(participants: Vec<Uuid>, region: impl Into<String>) -> Self {
    Self {
      participants,
      status: GroupStatus::default(),
      region: region.into(),
      created_at: None,
    }
  }

  /// Check size and uniqueness of the member list. Existence of each member
  /// is checked by the store.
  pub fn validate(&self) -> Result<()> {
    let n = self.participants.len();
    if !(MIN_GROUP_SIZE..=MAX_GROUP_SIZE).contains(&n) {
      return Err(Error::InvalidGroup(format!(
        "a group needs {MIN_GROUP_SIZE}-{MAX_GROUP_SIZE} participants, got {n}"
      )));
    }
    let unique: HashSet<_> = self.participants.iter().collect();
    if unique.len() != n {
      return Err(Error::InvalidGroup("duplicate participant".into()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  fn ids(n: usize) -> Vec<Uuid> { (0..n).map(|_| Uuid::new_v4()).collect() }

  #[test]
  fn sizes_one_through_four_are_valid() {
    for n in 1..=4 {
      assert!(NewGroup::new(ids(n), "north").validate().is_ok(), "size {n}");
    }
  }

  #[test]
  fn empty_and_oversized_groups_are_rejected() {
    assert!(matches!(
      NewGroup::new(vec![], "north").validate(),
      Err(Error::InvalidGroup(_))
    ));
    assert!(matches!(
      NewGroup::new(ids(5), "north").validate(),
      Err(Error::InvalidGroup(_))
    ));
  }

  #[test]
  fn duplicate_members_are_rejected() {
    let id = Uuid::new_v4();
    let g = NewGroup::new(vec![id, Uuid::new_v4(), id], "north");
    assert!(matches!(g.validate(), Err(Error::InvalidGroup(_))));
  }

  #[test]
  fn status_string_forms_match_serde() {
    assert_eq!(GroupStatus::Completed.to_string(), "completed");
    assert_eq!(
      GroupStatus::from_str("cancelled").unwrap(),
      GroupStatus::Cancelled
    );
    assert_eq!(
      serde_json::to_value(GroupStatus::Active).unwrap(),
      serde_json::json!("active")
    );
  }
}
