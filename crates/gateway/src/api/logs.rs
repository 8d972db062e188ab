use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use futures_util::StreamExt;

use crate::runtime::publisher;
use crate::state::AppState;

/// `GET /logs/:session_id`: live progress as server-sent events.
///
/// Each record is a bare `data:` line of JSON. Keep-alives are the
/// `{"ping": true}` records the publisher interleaves itself.
pub async fn stream_logs(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let heartbeat = Duration::from_secs(state.config.stream.heartbeat_secs);
    let records = publisher::record_stream(&state.registry, &session_id, heartbeat);
    let events = records.map(|record| Ok::<_, Infallible>(Event::default().data(record.to_json())));
    Sse::new(events)
}
