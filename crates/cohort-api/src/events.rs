//! `GET /admin/events`: the change feed as server-sent events.
//!
//! Each committed mutation becomes one `change` event whose data is the JSON
//! [`ChangeEvent`]. A subscriber that falls behind receives a `lagged` event
//! with the number of skipped changes and should re-query what it shows.

use std::{convert::Infallible, time::Duration};

use axum::{
  extract::State,
  response::sse::{Event, KeepAlive, Sse},
};
use cohort_core::{events::ChangeEvent, store::Store};
use futures::{Stream, stream};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{AppState, auth::AdminIdentity};

const KEEP_ALIVE: Duration = Duration::from_secs(15);

fn change_event(event: &ChangeEvent) -> Event {
  match Event::default().event("change").json_data(event) {
    Ok(ev) => ev,
    Err(e) => {
      tracing::error!(error = %e, "could not encode change event");
      Event::default().event("error").data("encoding failure")
    }
  }
}

/// Turn a broadcast receiver into an SSE stream that ends when the sender is
/// dropped.
pub fn stream_changes(
  rx: broadcast::Receiver<ChangeEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
  stream::unfold(rx, |mut rx| async move {
    match rx.recv().await {
      Ok(event) => Some((Ok(change_event(&event)), rx)),
      Err(RecvError::Lagged(skipped)) => {
        tracing::warn!(skipped, "change feed subscriber lagged");
        Some((Ok(Event::default().event("lagged").data(skipped.to_string())), rx))
      }
      Err(RecvError::Closed) => None,
    }
  })
}

/// `GET /admin/events`
pub async fn subscribe<S: Store + 'static>(
  admin: AdminIdentity,
  State(state): State<AppState<S>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
  tracing::info!(admin = %admin.subject, "change feed subscriber connected");
  Sse::new(stream_changes(state.store.subscribe()))
    .keep_alive(KeepAlive::new().interval(KEEP_ALIVE))
}

#[cfg(test)]
mod tests {
  use cohort_core::events::ChangeFeed;
  use futures::StreamExt as _;
  use uuid::Uuid;

  use super::*;

  #[tokio::test]
  async fn stream_yields_published_events_then_ends() {
    let feed = ChangeFeed::new();
    let mut changes = Box::pin(stream_changes(feed.subscribe()));

    feed.publish(ChangeEvent::SeasonCreated { season_id: Uuid::new_v4() });
    assert!(changes.next().await.is_some());

    drop(feed);
    assert!(changes.next().await.is_none());
  }
}
