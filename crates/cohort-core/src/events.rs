//! Change notifications published by stores after each committed mutation.
//!
//! Subscribers (e.g. the admin console's live views) receive events in commit
//! order and re-query whatever they display.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{comment::CommentParent, group::GroupStatus};

/// Buffer size for [`ChangeFeed`]; slower receivers observe a lag error.
pub const CHANGE_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
  SeasonCreated { season_id: Uuid },
  TaskCreated { season_id: Uuid, task_id: Uuid },
  TaskDeleted { season_id: Uuid, task_id: Uuid },
  CommentAdded { parent: CommentParent, comment_id: Uuid },
  CommentDeleted { parent: CommentParent, comment_id: Uuid },
  ParticipantUpserted { participant_id: Uuid },
  FeedbackSubmitted { participant_id: Uuid, feedback_id: Uuid },
  FeedbackDeleted { participant_id: Uuid, count: u64 },
  GroupCreated { group_id: Uuid },
  GroupStatusChanged { group_id: Uuid, status: GroupStatus },
}

/// A broadcast hub for [`ChangeEvent`]s.
///
/// Cloning is cheap; all clones publish to the same set of subscribers.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
  tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
  pub fn new() -> Self {
    let (tx, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
    Self { tx }
  }

  /// Publish an event. Having no subscribers is not an error.
  pub fn publish(&self, event: ChangeEvent) { let _ = self.tx.send(event); }

  pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
    self.tx.subscribe()
  }
}

impl Default for ChangeFeed {
  fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn subscribers_receive_events_in_order() {
    let feed = ChangeFeed::new();
    let mut rx = feed.subscribe();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    feed.publish(ChangeEvent::SeasonCreated { season_id: a });
    feed.publish(ChangeEvent::GroupCreated { group_id: b });

    assert_eq!(rx.recv().await.unwrap(), ChangeEvent::SeasonCreated {
      season_id: a,
    });
    assert_eq!(rx.recv().await.unwrap(), ChangeEvent::GroupCreated {
      group_id: b,
    });
  }

  #[test]
  fn publishing_without_subscribers_is_silent() {
    ChangeFeed::new().publish(ChangeEvent::SeasonCreated {
      season_id: Uuid::new_v4(),
    });
  }

  #[test]
  fn events_are_tagged() {
    let json = serde_json::to_value(ChangeEvent::FeedbackDeleted {
      participant_id: Uuid::nil(),
      count:          3,
    })
    .unwrap();
    assert_eq!(json["event"], "feedback_deleted");
    assert_eq!(json["count"], 3);
  }
}
