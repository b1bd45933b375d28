//! UI Backend - drives the chat core on behalf of a frontend
//!
//! ## Architecture
//!
//! - **ChatController**: owns session, transcript and indicator; runs exchanges
//! - **ClientEvent**: async event channel from background tasks
//! - **UiSurface**: trait that frontends implement
//! - **SpeechOutput**: optional sink for completed replies

mod controller;
mod traits;

pub use controller::{ChatController, SubmitOutcome};
pub use traits::{SpeechOutput, UiSurface};
