//! History Loader - rebuilds a transcript from stored sessions

use super::errors::ChatError;
use super::transcript::{Role, Transcript};
use crate::backend::{ChatBackend, SessionHistory, SessionId, SessionSummary};

/// Stored sessions, as ordered by the backend
pub async fn list_sessions(backend: &dyn ChatBackend) -> Result<Vec<SessionSummary>, ChatError> {
    backend.list_sessions().await.map_err(|e| {
        tracing::error!("Failed to list sessions: {}", e);
        ChatError::Backend(e)
    })
}

/// Fetch the stored prompt/response arrays of one session
pub async fn fetch_history(
    backend: &dyn ChatBackend,
    id: &SessionId,
) -> Result<SessionHistory, ChatError> {
    backend.session_history(id).await.map_err(|e| {
        tracing::error!("Failed to load session {}: {}", id, e);
        ChatError::Backend(e)
    })
}

/// Interleave stored prompts and replies by index
///
/// For each index the prompt comes first, then the reply. A trailing prompt
/// without a reply is kept. Empty strings are skipped.
pub fn replay_order(history: &SessionHistory) -> Vec<(Role, &str)> {
    let turns = history.user.len().max(history.assistant.len());
    let mut out = Vec::with_capacity(history.user.len() + history.assistant.len());

    for i in 0..turns {
        if let Some(prompt) = history.user.get(i).filter(|s| !s.is_empty()) {
            out.push((Role::User, prompt.as_str()));
        }
        if let Some(reply) = history.assistant.get(i).filter(|s| !s.is_empty()) {
            out.push((Role::Assistant, reply.as_str()));
        }
    }

    out
}

/// Clear the transcript and render `history` into it
///
/// Replayed entries are complete, so assistant entries are closed at once.
/// Callers must tear the thinking indicator down first.
pub fn replay_into(transcript: &mut Transcript, history: &SessionHistory) -> usize {
    transcript.clear();
    let entries = replay_order(history);
    for (role, text) in &entries {
        let id = transcript.append(*role, *text);
        transcript.close(id);
    }
    entries.len()
}
