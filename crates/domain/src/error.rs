/// Shared error type used across all cartrunner crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: crate::event::SessionStatus,
        to: crate::event::SessionStatus,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
