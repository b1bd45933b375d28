//! companion-chat: streaming chat session client
//!
//! This library provides:
//! - Session acquisition and history replay against a chat backend
//! - Incremental (token-by-token) response streaming over server-sent events
//! - A transcript with an animated "thinking" placeholder
//! - A controller that keeps at most one exchange in flight
//! - A terminal chat frontend and a local echo backend

pub mod backend;
pub mod config;
pub mod core;
pub mod speech;
pub mod transport;
pub mod ui_backend;

pub use backend::{ChatBackend, HttpBackend};
pub use config::Config;
pub use ui_backend::{ChatController, SubmitOutcome, UiSurface};
