//! WebSocket observer endpoint.
//!
//! `GET /ws` upgrades to a text WebSocket carrying JSON [`TaskEvent`]s.
//!
//! ## Lifecycle
//!
//! 1. A [`ChannelObserver`] is subscribed to the task manager; it buffers
//!    events in a bounded channel and never blocks the broadcaster.
//! 2. One progress event per existing task is sent as the initial snapshot.
//! 3. Buffered and live events are forwarded. Events older than the snapshot
//!    of their task are dropped so a client never sees progress go back.
//! 4. On close, a socket error, a full buffer or server shutdown the observer
//!    is unsubscribed.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vhunter_core::{ObserverError, TaskEvent, TaskId, TaskObserver};

use crate::state::AppState;

/// Events buffered per connection before it is considered stalled.
const CLIENT_BUFFER: usize = 256;

/// Observer that forwards into a per-connection channel.
pub struct ChannelObserver {
    tx: mpsc::Sender<TaskEvent>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TaskEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl TaskObserver for ChannelObserver {
    fn deliver(&self, event: &TaskEvent) -> Result<(), ObserverError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ObserverError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => ObserverError::Closed,
        })
    }
}

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (observer, mut events) = ChannelObserver::new(CLIENT_BUFFER);
    let observer_id = state.manager.subscribe(Arc::new(observer)).await;
    info!(observer = %observer_id, "websocket client connected");

    let (mut sender, mut receiver) = socket.split();

    let snapshot = state.manager.snapshot_events().await;
    let mut seen: HashMap<TaskId, DateTime<Utc>> = HashMap::new();
    let mut open = true;
    for event in &snapshot {
        if let TaskEvent::Progress { id, updated, .. } = event {
            seen.insert(id.clone(), *updated);
        }
        if !send_event(&mut sender, event).await {
            open = false;
            break;
        }
    }

    while open {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }

            event = events.recv() => {
                // None: the manager dropped us (buffer full or shut down).
                let Some(event) = event else { break };
                if is_stale(&seen, &event) {
                    continue;
                }
                if !send_event(&mut sender, &event).await {
                    break;
                }
            }

            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.manager.unsubscribe(observer_id).await;
    info!(observer = %observer_id, "websocket client disconnected");
}

/// Returns `false` once the socket is gone.
async fn send_event<S>(sender: &mut S, event: &TaskEvent) -> bool
where
    S: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize task event");
            return true;
        }
    };
    if sender.send(Message::Text(json.into())).await.is_err() {
        debug!("websocket send failed");
        return false;
    }
    true
}

/// Whether `event` predates the snapshot already sent for its task.
fn is_stale(seen: &HashMap<TaskId, DateTime<Utc>>, event: &TaskEvent) -> bool {
    match event {
        TaskEvent::Progress { id, updated, .. } => seen.get(id).is_some_and(|s| updated < s),
        TaskEvent::Cleared { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use vhunter_core::Task;

    use super::*;

    #[test]
    fn test_channel_observer_reports_backpressure_and_close() {
        let (observer, rx) = ChannelObserver::new(1);
        let event = TaskEvent::from_task(&Task::new(TaskId::from("a")));
        assert!(observer.deliver(&event).is_ok());
        assert_eq!(observer.deliver(&event), Err(ObserverError::Backpressure));
        drop(rx);
        assert_eq!(observer.deliver(&event), Err(ObserverError::Closed));
    }

    #[test]
    fn test_events_older_than_snapshot_are_stale() {
        let task = Task::new(TaskId::from("a"));
        let mut seen = HashMap::new();
        seen.insert(task.id.clone(), task.updated);

        let mut older = task.clone();
        older.updated = task.updated - Duration::seconds(1);
        assert!(is_stale(&seen, &TaskEvent::from_task(&older)));
        assert!(!is_stale(&seen, &TaskEvent::from_task(&task)));

        let other = Task::new(TaskId::from("b"));
        assert!(!is_stale(&seen, &TaskEvent::from_task(&other)));
        assert!(!is_stale(&seen, &TaskEvent::Cleared { updated: Utc::now() }));
    }
}
