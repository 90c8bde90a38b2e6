//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order equals chronological order.
//! UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr as _;

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use cohort_core::{
  comment::{Comment, CommentParent},
  group::{Group, GroupStatus},
  participant::{Feedback, Participant},
  season::{Season, Task},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Clamp to the precision [`encode_dt`] keeps, so a value survives a round
/// trip through a column unchanged.
pub fn stored_precision(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

/// The current time at stored precision.
pub fn now() -> DateTime<Utc> { stored_precision(Utc::now()) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── CommentParent ───────────────────────────────────────────────────────────

/// Split a parent into its `(parent_kind, parent_id)` column values.
pub fn encode_parent(p: CommentParent) -> (&'static str, String) {
  match p {
    CommentParent::Season(id) => ("season", encode_uuid(id)),
    CommentParent::Task(id) => ("task", encode_uuid(id)),
  }
}

pub fn decode_parent(kind: &str, id: &str) -> Result<CommentParent> {
  let id = decode_uuid(id)?;
  match kind {
    "season" => Ok(CommentParent::Season(id)),
    "task" => Ok(CommentParent::Task(id)),
    other => Err(Error::UnknownParentKind(other.to_owned())),
  }
}

// ─── GroupStatus ─────────────────────────────────────────────────────────────

pub fn encode_status(s: GroupStatus) -> String { s.to_string() }

pub fn decode_status(s: &str) -> Result<GroupStatus> {
  Ok(GroupStatus::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `seasons` row.
pub struct RawSeason {
  pub season_id:   String,
  pub name:        String,
  pub description: Option<String>,
  pub created_at:  String,
}

impl RawSeason {
  pub const COLUMNS: &'static str = "season_id, name, description, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      season_id:   row.get(0)?,
      name:        row.get(1)?,
      description: row.get(2)?,
      created_at:  row.get(3)?,
    })
  }

  pub fn into_season(self) -> Result<Season> {
    Ok(Season {
      season_id:   decode_uuid(&self.season_id)?,
      name:        self.name,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `tasks` row.
pub struct RawTask {
  pub task_id:     String,
  pub season_id:   String,
  pub title:       String,
  pub description: Option<String>,
  pub created_at:  String,
}

impl RawTask {
  pub const COLUMNS: &'static str =
    "task_id, season_id, title, description, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      task_id:     row.get(0)?,
      season_id:   row.get(1)?,
      title:       row.get(2)?,
      description: row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_task(self) -> Result<Task> {
    Ok(Task {
      task_id:     decode_uuid(&self.task_id)?,
      season_id:   decode_uuid(&self.season_id)?,
      title:       self.title,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `comments` row.
pub struct RawComment {
  pub comment_id:  String,
  pub parent_kind: String,
  pub parent_id:   String,
  pub author_id:   String,
  pub author_name: String,
  pub text:        String,
  pub created_at:  String,
}

impl RawComment {
  pub const COLUMNS: &'static str =
    "comment_id, parent_kind, parent_id, author_id, author_name, body, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id:  row.get(0)?,
      parent_kind: row.get(1)?,
      parent_id:   row.get(2)?,
      author_id:   row.get(3)?,
      author_name: row.get(4)?,
      text:        row.get(5)?,
      created_at:  row.get(6)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id:  decode_uuid(&self.comment_id)?,
      parent:      decode_parent(&self.parent_kind, &self.parent_id)?,
      author_id:   self.author_id,
      author_name: self.author_name,
      text:        self.text,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `participants` row.
pub struct RawParticipant {
  pub participant_id: String,
  pub telegram_id:    i64,
  pub first_name:     String,
  pub last_name:      Option<String>,
  pub username:       Option<String>,
  pub region:         Option<String>,
  pub created_at:     String,
}

impl RawParticipant {
  pub const COLUMNS: &'static str = "participant_id, telegram_id, first_name, \
                                     last_name, username, region, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      participant_id: row.get(0)?,
      telegram_id:    row.get(1)?,
      first_name:     row.get(2)?,
      last_name:      row.get(3)?,
      username:       row.get(4)?,
      region:         row.get(5)?,
      created_at:     row.get(6)?,
    })
  }

  pub fn into_participant(self) -> Result<Participant> {
    Ok(Participant {
      participant_id: decode_uuid(&self.participant_id)?,
      telegram_id:    self.telegram_id,
      first_name:     self.first_name,
      last_name:      self.last_name,
      username:       self.username,
      region:         self.region,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `feedback` row.
pub struct RawFeedback {
  pub feedback_id:    String,
  pub participant_id: String,
  pub group_id:       Option<String>,
  pub content:        String,
  pub created_at:     String,
}

impl RawFeedback {
  pub const COLUMNS: &'static str =
    "feedback_id, participant_id, group_id, content, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      feedback_id:    row.get(0)?,
      participant_id: row.get(1)?,
      group_id:       row.get(2)?,
      content:        row.get(3)?,
      created_at:     row.get(4)?,
    })
  }

  pub fn into_feedback(self) -> Result<Feedback> {
    Ok(Feedback {
      feedback_id:    decode_uuid(&self.feedback_id)?,
      participant_id: decode_uuid(&self.participant_id)?,
      group_id:       self.group_id.as_deref().map(decode_uuid).transpose()?,
      content:        self.content,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// A `participant_groups` row plus its member ids in `position` order.
pub struct RawGroup {
  pub group_id:     String,
  pub status:       String,
  pub region:       String,
  pub created_at:   String,
  pub participants: Vec<String>,
}

impl RawGroup {
  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      group_id:     decode_uuid(&self.group_id)?,
      participants: self
        .participants
        .iter()
        .map(|s| decode_uuid(s))
        .collect::<Result<_>>()?,
      status:       decode_status(&self.status)?,
      region:       self.region,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let b = a + Duration::microseconds(1500);
    let c = a + Duration::seconds(1);
    let mut encoded = vec![encode_dt(c), encode_dt(a), encode_dt(b)];
    encoded.sort();
    assert_eq!(encoded, vec![encode_dt(a), encode_dt(b), encode_dt(c)]);
  }

  #[test]
  fn now_is_already_at_stored_precision() {
    let t = now();
    assert_eq!(decode_dt(&encode_dt(t)).unwrap(), t);

    let fine = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
      + Duration::nanoseconds(1_234_567);
    let clamped = stored_precision(fine);
    assert_eq!(clamped.timestamp_subsec_nanos(), 1_234_000);
    assert_eq!(decode_dt(&encode_dt(fine)).unwrap(), clamped);
  }

  #[test]
  fn timestamp_survives_encoding() {
    let t = Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap();
    assert_eq!(decode_dt(&encode_dt(t)).unwrap(), t);
  }

  #[test]
  fn unknown_parent_kind_is_an_error() {
    assert!(decode_parent("season", &Uuid::nil().to_string()).is_ok());
    assert!(decode_parent("group", &Uuid::nil().to_string()).is_err());
  }
}
