//! Shared types for cartrunner: configuration, progress events, session
//! status, stream records and the common error type.

pub mod config;
pub mod error;
pub mod event;
pub mod stream;
pub mod trace;

pub use error::{Error, Result};
pub use event::{Level, LogEvent, SessionStatus, COMPLETION_SENTINEL};
pub use stream::StreamRecord;
