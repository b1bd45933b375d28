//! Core domain modules
//!
//! Session identity, the transcript, the thinking indicator, stream
//! consumption and history replay. Nothing in here renders anything; the
//! ui_backend layer drives these types and forwards changes to a surface.

pub mod errors;
pub mod events;
pub mod history;
pub mod indicator;
pub mod session_registry;
pub mod stream_consumer;
pub mod transcript;

#[cfg(test)]
pub(crate) mod test_support;

pub use errors::{ChatError, TranscriptError};
pub use events::{ClientEvent, EventReceiver, EventSender, ExchangeId};
pub use indicator::ThinkingIndicator;
pub use session_registry::{SessionContext, SessionRegistry};
pub use stream_consumer::{ChunkOutcome, ResponseAccumulator, StreamConsumer, StreamHandle};
pub use transcript::{Entry, EntryKind, EntryRef, Role, Transcript, TranscriptChange};
