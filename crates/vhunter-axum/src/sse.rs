//! SSE event broadcaster for real-time task updates.
//!
//! [`SseBroadcaster`] is registered with the task manager as an ordinary
//! observer. Events go into a broadcast channel and are streamed to every
//! connected `/api/events` client.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use vhunter_core::{ObserverError, TaskEvent, TaskObserver};

#[derive(Debug, Clone)]
pub struct SseBroadcaster {
    sender: broadcast::Sender<TaskEvent>,
}

impl SseBroadcaster {
    /// Create a broadcaster buffering up to `capacity` events.
    ///
    /// Slow clients skip events when the buffer overflows.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a broadcaster with the default capacity (256 events).
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(256)
    }

    /// SSE response for a new client, ending when `shutdown` fires.
    ///
    /// Sends a keep-alive ping every 30 seconds.
    pub fn subscribe(
        self: Arc<Self>,
        shutdown: CancellationToken,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
        let receiver = self.sender.subscribe();
        let events = BroadcastStream::new(receiver).filter_map(|result| match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to serialize task event");
                    None
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "SSE client lagging");
                None
            }
        });
        let stream =
            futures_util::StreamExt::take_until(events, shutdown.cancelled_owned());

        Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("ping"),
        )
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl TaskObserver for SseBroadcaster {
    fn deliver(&self, event: &TaskEvent) -> Result<(), ObserverError> {
        // No connected clients is fine; the broadcaster stays registered.
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}
