//! Turns a session's event channel into the live record stream served on
//! `/logs/{id}`.

use std::time::Duration;

use futures_core::Stream;

use cr_domain::trace::TraceEvent;
use cr_domain::StreamRecord;
use cr_sessions::{Popped, SessionRegistry};

/// Stream the records for `session_id`.
///
/// Each bounded `pop` yields either the next event or, when nothing
/// arrived within `heartbeat`, a `{"ping": true}` record.  The stream ends
/// right after the terminal event.  An unknown (or malformed) id yields a
/// single error record and ends; the registry is only read.
///
/// Events are consumed: two streams attached to the same session split
/// its events between them.
pub fn record_stream(
    registry: &SessionRegistry,
    session_id: &str,
    heartbeat: Duration,
) -> impl Stream<Item = StreamRecord> + Send + 'static {
    let session = registry.lookup_str(session_id);
    let session_id = session_id.to_string();

    async_stream::stream! {
        let session = match session {
            Some(session) => session,
            None => {
                tracing::debug!(session_id = %session_id, "stream requested for unknown session");
                yield StreamRecord::session_not_found();
                return;
            }
        };

        TraceEvent::StreamAttached { session_id: session_id.clone() }.emit();
        let mut records = 0usize;
        let mut heartbeats = 0usize;

        loop {
            match session.channel().pop(heartbeat).await {
                Popped::Event(event) => {
                    let terminal = event.is_terminal();
                    records += 1;
                    yield StreamRecord::from(event);
                    if terminal {
                        break;
                    }
                }
                Popped::Timeout => {
                    heartbeats += 1;
                    yield StreamRecord::heartbeat();
                }
            }
        }

        TraceEvent::StreamClosed { session_id, records, heartbeats }.emit();
    }
}
