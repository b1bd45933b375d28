//! Chat backend access
//!
//! The [`ChatBackend`] trait is the seam between the session/streaming state
//! machine and the service that actually runs the model. [`HttpBackend`] talks
//! to it over JSON endpoints plus a `text/event-stream` response channel.

mod error;
mod http;
pub mod streaming;
mod types;

pub use error::BackendError;
pub use http::HttpBackend;
pub use streaming::{decode_sse, SseDecoder};
pub use types::{
    Envelope, HistoryRequest, PromptRequest, SessionHistory, SessionId, SessionSummary,
};

pub(crate) use types::CreateSessionReply;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Incremental response payloads for one exchange, in arrival order
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;

/// Operations offered by a chat backend
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Request a fresh session id
    async fn create_session(&self) -> Result<SessionId, BackendError>;

    /// Hand a prompt to the backend; the reply arrives on the response stream
    async fn send_prompt(&self, session: &SessionId, prompt: &str) -> Result<(), BackendError>;

    /// Open the server-push channel for the session's pending prompt
    async fn open_stream(&self, session: &SessionId) -> Result<ChunkStream, BackendError>;

    /// Stored sessions, in the order the backend returns them
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError>;

    /// Full prompt/response history of one session
    async fn session_history(&self, session: &SessionId) -> Result<SessionHistory, BackendError>;

    /// Wipe every stored session
    async fn clear_sessions(&self) -> Result<(), BackendError>;
}
