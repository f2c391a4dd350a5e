//! SSE events handler.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures_util::stream::Stream;
use tracing::debug;

use crate::state::AppState;

/// `GET /api/events`: every task event as it happens.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let sse = state.sse.clone().subscribe(state.shutdown.clone());
    debug!(subscribers = state.sse.subscriber_count(), "sse client connected");
    sse
}
