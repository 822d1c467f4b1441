//! Browser-facing push stream.
//!
//! Re-broadcasts upstream change events to connected clients over SSE.
//! Delivery is at-most-once: a subscriber that lags past the broadcast
//! buffer skips ahead and only misses events it can recover from with a
//! re-fetch.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::state::AppState;

/// GET /api/events.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.bus.subscribe();
    debug!(target = "varco::push", "browser client subscribed");

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => match Event::default().event("change").json_data(&event) {
                    Ok(frame) => yield Ok(frame),
                    Err(error) => {
                        warn!(target = "varco::push", error = %error, "unserializable push event skipped");
                    }
                },
                // A lagging client just skips ahead.
                Err(RecvError::Lagged(skipped)) => {
                    debug!(target = "varco::push", skipped, "subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
