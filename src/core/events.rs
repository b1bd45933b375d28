//! Events delivered to the controller from background tasks
//!
//! Dispatch, stream reading and indicator animation run in spawned tasks;
//! they never touch client state directly and only report back through an
//! unbounded mpsc channel of these events.

use crate::backend::BackendError;

/// Identifies one prompt/response exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub(crate) u64);

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub enum ClientEvent {
    /// The backend accepted the prompt
    DispatchAcked(ExchangeId),

    /// The prompt never reached the backend
    DispatchFailed {
        exchange: ExchangeId,
        error: BackendError,
    },

    /// One payload from the response channel
    StreamChunk { exchange: ExchangeId, payload: String },

    /// The response channel ended; `error` is set for transport failures
    StreamClosed {
        exchange: ExchangeId,
        error: Option<String>,
    },

    /// Animation frame for the thinking placeholder
    IndicatorTick { generation: u64 },
}

impl ClientEvent {
    /// Exchange the event belongs to, if any
    pub fn exchange(&self) -> Option<ExchangeId> {
        match self {
            ClientEvent::DispatchAcked(exchange) => Some(*exchange),
            ClientEvent::DispatchFailed { exchange, .. }
            | ClientEvent::StreamChunk { exchange, .. }
            | ClientEvent::StreamClosed { exchange, .. } => Some(*exchange),
            ClientEvent::IndicatorTick { .. } => None,
        }
    }
}

pub type EventSender = tokio::sync::mpsc::UnboundedSender<ClientEvent>;
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<ClientEvent>;
