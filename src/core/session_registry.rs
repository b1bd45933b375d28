//! Session Registry - owns the current session identity
//!
//! The registry is the only place the current session id lives. Each
//! acquisition builds a whole new [`SessionContext`] that replaces the
//! previous one in a single assignment.

use chrono::{DateTime, Utc};

use super::errors::ChatError;
use crate::backend::{ChatBackend, SessionId};

/// Everything the client tracks about the active session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    id: SessionId,
    acquired_at: DateTime<Utc>,
    exchanges: u32,
}

impl SessionContext {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            acquired_at: Utc::now(),
            exchanges: 0,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Exchanges started from this client since the context was created
    pub fn exchanges(&self) -> u32 {
        self.exchanges
    }

    pub fn is_fresh(&self) -> bool {
        self.exchanges == 0
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    current: Option<SessionContext>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&SessionContext> {
        self.current.as_ref()
    }

    pub fn current_id(&self) -> Option<&SessionId> {
        self.current.as_ref().map(|c| &c.id)
    }

    /// Request a fresh session id from the backend
    ///
    /// On failure the previous context (or none) is kept.
    pub async fn acquire(&mut self, backend: &dyn ChatBackend) -> Result<SessionId, ChatError> {
        match backend.create_session().await {
            Ok(id) => {
                tracing::info!("Acquired session {}", id);
                self.current = Some(SessionContext::new(id.clone()));
                Ok(id)
            }
            Err(e) => {
                tracing::error!("Session acquisition failed: {}", e);
                Err(ChatError::Acquisition(e))
            }
        }
    }

    /// Drop the local id, then acquire a new one
    pub async fn reset(&mut self, backend: &dyn ChatBackend) -> Result<SessionId, ChatError> {
        if let Some(old) = self.current.take() {
            tracing::debug!("Releasing session {}", old.id);
        }
        self.acquire(backend).await
    }

    /// Make an existing server-side session current (history reload)
    pub fn adopt(&mut self, id: SessionId, exchanges: u32) {
        tracing::info!("Resuming session {}", id);
        self.current = Some(SessionContext {
            id,
            acquired_at: Utc::now(),
            exchanges,
        });
    }

    /// Count an exchange against the current session
    pub(crate) fn record_exchange(&mut self) {
        if let Some(ctx) = self.current.as_mut() {
            ctx.exchanges += 1;
        }
    }
}
