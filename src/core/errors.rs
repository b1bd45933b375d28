//! Domain error types
//!
//! Session/exchange failures, distinct from the transport-level
//! [`BackendError`]. None of them is fatal: the client stays usable and the
//! next user action may succeed.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors surfaced by chat operations
#[derive(Debug, Error)]
pub enum ChatError {
    /// No session id could be obtained; nothing may be dispatched
    #[error("Could not acquire a session: {0}")]
    Acquisition(#[source] BackendError),

    /// The prompt could not be handed to the backend
    #[error("Prompt dispatch failed: {0}")]
    Dispatch(#[source] BackendError),

    /// The response channel failed; handled like a normal end of stream
    #[error("Response stream failed: {0}")]
    Stream(String),

    /// A non-streaming backend call failed or was refused
    #[error("Backend error: {0}")]
    Backend(#[source] BackendError),

    /// An operation needed a current session and there is none
    #[error("No active session")]
    NoSession,
}

/// Violations of the transcript's append-only contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("Entry not found")]
    NotFound,

    #[error("Chunks may only target the most recent entry")]
    NotLast,

    #[error("Only assistant entries accept chunks")]
    NotAssistant,

    #[error("Entry is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_chat_error_keeps_backend_source() {
        let err = ChatError::Dispatch(BackendError::Network("refused".into()));
        assert_eq!(
            err.to_string(),
            "Prompt dispatch failed: Network error: refused"
        );
        assert!(err.source().is_some());
    }
}
