//! Seasons and the tasks assigned within them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named period of work that owns a list of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
  pub season_id:   Uuid,
  pub name:        String,
  pub description: Option<String>,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::Store::create_season`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewSeason {
  pub name:        String,
  #[serde(default)]
  pub description: Option<String>,
}

/// A unit of work handed out to groups during a season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
  pub task_id:     Uuid,
  pub season_id:   Uuid,
  pub title:       String,
  pub description: Option<String>,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::Store::create_task`].
#[derive(Debug, Clone)]
pub struct NewTask {
  pub season_id:   Uuid,
  pub title:       String,
  pub description: Option<String>,
}
