//! In-memory session lifecycle: the per-session event channel, the
//! session state machine and the process-wide registry.

pub mod channel;
pub mod registry;
pub mod session;

pub use channel::{EventChannel, Popped};
pub use registry::SessionRegistry;
pub use session::{Session, SessionSummary};
