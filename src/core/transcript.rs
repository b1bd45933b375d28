//! Transcript Store - ordered log of rendered entries
//!
//! Entries are appended in display order. Only the most recently appended
//! entry may grow, and only while it is an open assistant reply. Every
//! mutation is recorded as a [`TranscriptChange`] so the host surface can
//! render incrementally.

use super::errors::TranscriptError;

/// Who authored a message entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// What an entry is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Message(Role),
    /// Transient "thinking" placeholder
    Thinking,
}

/// Stable handle to an entry, valid until the entry is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryRef(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    id: EntryRef,
    kind: EntryKind,
    text: String,
    open: bool,
}

impl Entry {
    pub fn id(&self) -> EntryRef {
        self.id
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn role(&self) -> Option<Role> {
        match self.kind {
            EntryKind::Message(role) => Some(role),
            EntryKind::Thinking => None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the entry can still receive chunks
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == EntryKind::Thinking
    }
}

/// A single mutation, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptChange {
    Appended(Entry),
    /// Text of an existing entry changed; carries the full new text and the delta
    Updated {
        id: EntryRef,
        text: String,
        delta: String,
    },
    Closed(EntryRef),
    Removed(EntryRef),
    Cleared,
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_id: u64,
    changes: Vec<TranscriptChange>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }

    pub fn get(&self, id: EntryRef) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: EntryRef) -> bool {
        self.get(id).is_some()
    }

    /// Message entries only, as `(role, text)`
    pub fn messages(&self) -> impl Iterator<Item = (Role, &str)> {
        self.entries
            .iter()
            .filter_map(|e| e.role().map(|role| (role, e.text.as_str())))
    }

    pub fn placeholder_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_placeholder()).count()
    }

    /// Append a message entry
    ///
    /// User entries are complete at creation; assistant entries stay open
    /// for chunks until [`Transcript::close`].
    pub fn append(&mut self, role: Role, text: impl Into<String>) -> EntryRef {
        self.push(EntryKind::Message(role), text.into(), role == Role::Assistant)
    }

    /// Append the thinking placeholder
    pub(crate) fn append_placeholder(&mut self, text: impl Into<String>) -> EntryRef {
        self.push(EntryKind::Thinking, text.into(), false)
    }

    fn push(&mut self, kind: EntryKind, text: String, open: bool) -> EntryRef {
        let id = EntryRef(self.next_id);
        self.next_id += 1;
        let entry = Entry {
            id,
            kind,
            text,
            open,
        };
        self.changes.push(TranscriptChange::Appended(entry.clone()));
        self.entries.push(entry);
        id
    }

    /// Concatenate a chunk onto the open assistant entry
    ///
    /// The target must be the most recently appended entry.
    pub fn append_chunk(&mut self, id: EntryRef, chunk: &str) -> Result<(), TranscriptError> {
        let last = self.entries.last_mut().ok_or(TranscriptError::NotFound)?;
        if last.id != id {
            return Err(if self.entries.iter().any(|e| e.id == id) {
                TranscriptError::NotLast
            } else {
                TranscriptError::NotFound
            });
        }
        if last.kind != EntryKind::Message(Role::Assistant) {
            return Err(TranscriptError::NotAssistant);
        }
        if !last.open {
            return Err(TranscriptError::Closed);
        }

        last.text.push_str(chunk);
        self.changes.push(TranscriptChange::Updated {
            id,
            text: last.text.clone(),
            delta: chunk.to_string(),
        });
        Ok(())
    }

    /// Freeze an assistant entry once its stream has ended
    pub fn close(&mut self, id: EntryRef) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            if entry.open {
                entry.open = false;
                self.changes.push(TranscriptChange::Closed(id));
            }
        }
    }

    /// Replace the placeholder's text (animation frames)
    pub(crate) fn set_placeholder_text(&mut self, id: EntryRef, text: String) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.id == id && e.is_placeholder())
        {
            Some(entry) => {
                if entry.text != text {
                    entry.text = text.clone();
                    self.changes.push(TranscriptChange::Updated {
                        id,
                        text,
                        delta: String::new(),
                    });
                }
                true
            }
            None => false,
        }
    }

    /// Remove a single entry; returns whether it was present
    pub fn remove(&mut self, id: EntryRef) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(idx) => {
                self.entries.remove(idx);
                self.changes.push(TranscriptChange::Removed(id));
                true
            }
            None => false,
        }
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.changes.push(TranscriptChange::Cleared);
    }

    /// Take the changes recorded since the last drain
    pub fn drain_changes(&mut self) -> Vec<TranscriptChange> {
        std::mem::take(&mut self.changes)
    }
}
