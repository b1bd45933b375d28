//! Host surface traits
//!
//! Defines the interface a frontend implements to display the transcript.
//! Every method has a no-op default so a headless caller only overrides
//! what it renders.

use crate::core::{Entry, EntryRef};

/// Receives transcript changes in the order they happened
pub trait UiSurface {
    /// A new entry was appended at the end
    fn entry_appended(&mut self, _entry: &Entry) {}

    /// An entry's text changed
    ///
    /// `text` is the full new text; `delta` is what a chunk appended (empty
    /// for placeholder animation frames).
    fn entry_updated(&mut self, _id: EntryRef, _text: &str, _delta: &str) {}

    /// An assistant reply finished streaming
    fn entry_closed(&mut self, _id: EntryRef) {}

    fn entry_removed(&mut self, _id: EntryRef) {}

    /// Every entry was removed
    fn cleared(&mut self) {}

    /// Send affordances were locked (`true`) or released (`false`)
    fn affordances_changed(&mut self, _locked: bool) {}

    /// First exchange of a session; expand the transcript area
    fn layout_expanded(&mut self) {}
}

/// Speaks a completed assistant reply
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, text: &str);
}
