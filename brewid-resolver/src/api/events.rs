//! Server-Sent Events stream of resolver events

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::AppState;

/// Optional filter for one session
#[derive(Debug, Deserialize)]
pub struct EventQuery {
    pub session_id: Option<String>,
}

/// GET /events[?session_id=...]
///
/// Streams SessionStarted, AmbiguousMatchFallback, ChoiceRecorded,
/// PartialSaveCompleted, SessionCommitted, CommitFailed, SessionAbandoned
/// and CleanupRefused.
pub async fn event_stream(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(session_filter = ?query.session_id, "New SSE client connected");

    let mut rx = state.event_bus.subscribe();
    let filter = query.session_id;

    let stream = async_stream::stream! {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE client lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if filter.as_deref().is_some_and(|id| id != event.session_id()) {
                continue;
            }

            let event_type = event.event_type();
            match serde_json::to_string(&event) {
                Ok(json) => {
                    debug!(event_type, "SSE: forwarding event");
                    yield Ok(Event::default().event(event_type).data(json));
                }
                Err(e) => warn!(event_type, error = %e, "SSE: failed to serialize event"),
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

/// Build event stream routes
pub fn event_routes() -> Router<AppState> {
    Router::new().route("/events", get(event_stream))
}
