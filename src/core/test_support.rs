//! In-memory backend double for unit tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::backend::{
    BackendError, ChatBackend, ChunkStream, SessionHistory, SessionId, SessionSummary,
};

pub(crate) type ReplySender = mpsc::UnboundedSender<Result<String, BackendError>>;

#[derive(Default)]
struct Inner {
    next_id: u32,
    fail_create: bool,
    fail_send: bool,
    fail_open: bool,
    fail_history: bool,
    replies: VecDeque<UnboundedReceiverStream<Result<String, BackendError>>>,
    prompts: Vec<(SessionId, String)>,
    sessions: Vec<SessionSummary>,
    histories: HashMap<String, SessionHistory>,
    clear_calls: usize,
    open_calls: usize,
}

/// Scripted [`ChatBackend`]: session ids count up, replies are queued by the test
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    inner: Mutex<Inner>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }

    pub(crate) fn fail_create(&self, fail: bool) {
        self.with(|i| i.fail_create = fail);
    }

    pub(crate) fn fail_send(&self, fail: bool) {
        self.with(|i| i.fail_send = fail);
    }

    pub(crate) fn fail_open(&self, fail: bool) {
        self.with(|i| i.fail_open = fail);
    }

    pub(crate) fn fail_history(&self, fail: bool) {
        self.with(|i| i.fail_history = fail);
    }

    /// Queue a reply whose chunks are all available and which then ends
    pub(crate) fn script_reply(&self, chunks: &[&str]) {
        let tx = self.open_reply();
        for chunk in chunks {
            let _ = tx.send(Ok(chunk.to_string()));
        }
    }

    /// Queue a reply the test feeds by hand; dropping the sender ends it
    pub(crate) fn open_reply(&self) -> ReplySender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.with(|i| i.replies.push_back(UnboundedReceiverStream::new(rx)));
        tx
    }

    pub(crate) fn add_session(&self, id: &str, ts: &str, history: SessionHistory) {
        self.with(|i| {
            i.sessions.push(SessionSummary {
                id: SessionId::new(id),
                created_at: chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S").ok(),
            });
            i.histories.insert(id.to_string(), history);
        });
    }

    pub(crate) fn prompts(&self) -> Vec<(SessionId, String)> {
        self.with(|i| i.prompts.clone())
    }

    pub(crate) fn open_calls(&self) -> usize {
        self.with(|i| i.open_calls)
    }

    pub(crate) fn clear_calls(&self) -> usize {
        self.with(|i| i.clear_calls)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn create_session(&self) -> Result<SessionId, BackendError> {
        self.with(|i| {
            if i.fail_create {
                return Err(BackendError::Network("connection refused".into()));
            }
            i.next_id += 1;
            Ok(SessionId::new(format!("session-{}", i.next_id)))
        })
    }

    async fn send_prompt(&self, session: &SessionId, prompt: &str) -> Result<(), BackendError> {
        self.with(|i| {
            if i.fail_send {
                return Err(BackendError::Rejected("Invalid session_id".into()));
            }
            i.prompts.push((session.clone(), prompt.to_string()));
            Ok(())
        })
    }

    async fn open_stream(&self, _session: &SessionId) -> Result<ChunkStream, BackendError> {
        self.with(|i| {
            i.open_calls += 1;
            if i.fail_open {
                return Err(BackendError::Http {
                    status: 400,
                    body: "Invalid session_id".into(),
                });
            }
            let stream: ChunkStream = match i.replies.pop_front() {
                Some(reply) => Box::pin(reply),
                None => Box::pin(futures::stream::empty()),
            };
            Ok(stream)
        })
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError> {
        Ok(self.with(|i| i.sessions.clone()))
    }

    async fn session_history(&self, session: &SessionId) -> Result<SessionHistory, BackendError> {
        self.with(|i| {
            if i.fail_history {
                return Err(BackendError::Network("timeout".into()));
            }
            i.histories
                .get(session.as_str())
                .cloned()
                .ok_or_else(|| BackendError::Rejected("Chat not found".into()))
        })
    }

    async fn clear_sessions(&self) -> Result<(), BackendError> {
        self.with(|i| {
            i.clear_calls += 1;
            i.sessions.clear();
            i.histories.clear();
        });
        Ok(())
    }
}
