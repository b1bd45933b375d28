//! Send Controller - drives one chat session end to end
//!
//! The controller is the single owner of the session registry, transcript
//! and thinking indicator. Network work runs in spawned tasks that only report
//! back through [`ClientEvent`]s; the host feeds those to
//! [`ChatController::handle_event`], so all state changes happen on one
//! logical thread.
//!
//! At most one exchange is in flight. The send lock is taken by
//! [`ChatController::submit`] and released when the response stream ends,
//! the prompt dispatch fails, or the exchange is cancelled by a session
//! switch.

use std::sync::Arc;
use tokio::task::JoinHandle;

use super::traits::{SpeechOutput, UiSurface};
use crate::backend::{ChatBackend, SessionId, SessionSummary};
use crate::config::Config;
use crate::core::history;
use crate::core::{
    ChatError, ClientEvent, EventSender, ExchangeId, ResponseAccumulator, Role, SessionRegistry,
    StreamConsumer, StreamHandle, ThinkingIndicator, Transcript, TranscriptChange,
};

/// Result of a [`ChatController::submit`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Input was empty after trimming; nothing happened
    Ignored,
    /// An exchange is already in flight; the input was dropped
    Busy,
    Started(ExchangeId),
}

struct ActiveExchange {
    id: ExchangeId,
    session: SessionId,
    accumulator: ResponseAccumulator,
    dispatch: Option<JoinHandle<()>>,
    stream: Option<StreamHandle>,
}

impl ActiveExchange {
    fn abort(&mut self) {
        if let Some(dispatch) = self.dispatch.take() {
            dispatch.abort();
        }
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
    }
}

pub struct ChatController {
    backend: Arc<dyn ChatBackend>,
    registry: SessionRegistry,
    transcript: Transcript,
    indicator: ThinkingIndicator,
    consumer: StreamConsumer,
    surface: Box<dyn UiSurface + Send>,
    speech: Option<Arc<dyn SpeechOutput>>,
    events: EventSender,
    active: Option<ActiveExchange>,
    next_exchange: u64,
}

impl ChatController {
    /// Create a controller; background tasks report on `events`
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        config: &Config,
        surface: Box<dyn UiSurface + Send>,
        events: EventSender,
    ) -> Self {
        let consumer = StreamConsumer::new(
            Arc::clone(&backend),
            config.backend.stream_idle_timeout(),
        );
        Self {
            backend,
            registry: SessionRegistry::new(),
            transcript: Transcript::new(),
            indicator: ThinkingIndicator::new(config.indicator.clone()),
            consumer,
            surface,
            speech: None,
            events,
            active: None,
            next_exchange: 1,
        }
    }

    /// Forward completed replies to `speech`
    pub fn with_speech(mut self, speech: Arc<dyn SpeechOutput>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn indicator(&self) -> &ThinkingIndicator {
        &self.indicator
    }

    pub fn is_exchange_in_flight(&self) -> bool {
        self.active.is_some()
    }

    /// Acquire the first session
    pub async fn start(&mut self) -> Result<SessionId, ChatError> {
        self.registry.acquire(self.backend.as_ref()).await
    }

    /// Submit a prompt and start an exchange
    ///
    /// When no session is held yet one acquisition is attempted first; if it
    /// fails nothing is locked or appended.
    pub async fn submit(&mut self, raw: &str) -> Result<SubmitOutcome, ChatError> {
        let prompt = raw.trim();
        if prompt.is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }
        if let Some(active) = &self.active {
            tracing::debug!("Ignoring submit while exchange {} is open", active.id);
            return Ok(SubmitOutcome::Busy);
        }

        let session = match self.registry.current_id() {
            Some(id) => id.clone(),
            None => self.registry.acquire(self.backend.as_ref()).await?,
        };

        if self.registry.current().is_some_and(|ctx| ctx.is_fresh()) {
            self.surface.layout_expanded();
        }
        self.registry.record_exchange();

        let id = ExchangeId(self.next_exchange);
        self.next_exchange += 1;

        self.set_locked(true);
        self.transcript.append(Role::User, prompt);
        self.indicator.show(&mut self.transcript, &self.events);

        let dispatch = self.spawn_dispatch(id, session.clone(), prompt.to_string());
        tracing::info!("Exchange {} started on session {}", id, session);
        self.active = Some(ActiveExchange {
            id,
            session,
            accumulator: ResponseAccumulator::new(),
            dispatch: Some(dispatch),
            stream: None,
        });

        self.flush();
        Ok(SubmitOutcome::Started(id))
    }

    fn spawn_dispatch(&self, id: ExchangeId, session: SessionId, prompt: String) -> JoinHandle<()> {
        let backend = Arc::clone(&self.backend);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let event = match backend.send_prompt(&session, &prompt).await {
                Ok(()) => ClientEvent::DispatchAcked(id),
                Err(error) => ClientEvent::DispatchFailed {
                    exchange: id,
                    error,
                },
            };
            let _ = tx.send(event);
        })
    }

    /// Apply one event from a background task
    pub fn handle_event(&mut self, event: ClientEvent) {
        if let ClientEvent::IndicatorTick { generation } = event {
            self.indicator.on_tick(generation, &mut self.transcript);
            self.flush();
            return;
        }

        let Some(active) = self
            .active
            .as_mut()
            .filter(|a| event.exchange() == Some(a.id))
        else {
            tracing::debug!("Dropping event for a finished exchange: {:?}", event);
            return;
        };

        match event {
            ClientEvent::DispatchAcked(id) => {
                tracing::debug!("Exchange {} dispatched", id);
                active.dispatch = None;
                active.stream = Some(self.consumer.attach(
                    active.session.clone(),
                    id,
                    &self.events,
                ));
            }
            ClientEvent::DispatchFailed { exchange, error } => {
                tracing::error!("Exchange {}: {}", exchange, ChatError::Dispatch(error));
                active.dispatch = None;
                self.finish_exchange();
            }
            ClientEvent::StreamChunk { exchange, payload } => {
                if let Err(e) =
                    active
                        .accumulator
                        .apply(&payload, &mut self.transcript, &mut self.indicator)
                {
                    tracing::warn!("Exchange {}: dropped chunk: {}", exchange, e);
                }
            }
            ClientEvent::StreamClosed { exchange, error } => {
                if let Some(error) = error {
                    tracing::warn!("Exchange {}: {}", exchange, ChatError::Stream(error));
                }
                self.finish_exchange();
            }
            ClientEvent::IndicatorTick { .. } => {}
        }

        self.flush();
    }

    /// Terminal signal: tear down, release the lock, speak the reply
    fn finish_exchange(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.abort();

        let reply = active
            .accumulator
            .finish(&mut self.transcript, &mut self.indicator);
        tracing::info!("Exchange {} finished", active.id);
        self.set_locked(false);

        if let (Some(speech), Some(text)) = (&self.speech, reply) {
            if !text.trim().is_empty() {
                speech.speak(&text);
            }
        }
    }

    /// Close whatever exchange is open without waiting for its stream
    fn cancel_exchange(&mut self) {
        if let Some(mut active) = self.active.take() {
            tracing::info!("Cancelling exchange {}", active.id);
            active.abort();
            self.indicator.force_teardown(&mut self.transcript);
            self.set_locked(false);
        }
    }

    /// Wipe the transcript and start over on a fresh session
    pub async fn new_chat(&mut self) -> Result<SessionId, ChatError> {
        self.cancel_exchange();
        self.indicator.force_teardown(&mut self.transcript);
        self.transcript.clear();
        self.flush();
        self.registry.reset(self.backend.as_ref()).await
    }

    /// Replace the transcript with a stored session and continue it
    ///
    /// If the history cannot be fetched nothing changes, including any
    /// exchange that is still open.
    pub async fn load_session(&mut self, id: SessionId) -> Result<usize, ChatError> {
        let stored = history::fetch_history(self.backend.as_ref(), &id).await?;

        self.cancel_exchange();
        self.indicator.force_teardown(&mut self.transcript);
        let replayed = history::replay_into(&mut self.transcript, &stored);
        let prompts = stored.user.iter().filter(|p| !p.is_empty()).count();
        self.registry
            .adopt(id, u32::try_from(prompts).unwrap_or(u32::MAX));

        if replayed > 0 {
            self.surface.layout_expanded();
        }
        self.flush();
        Ok(replayed)
    }

    /// Delete every stored session, then start a new chat
    pub async fn clear_history(&mut self) -> Result<SessionId, ChatError> {
        self.backend.clear_sessions().await.map_err(|e| {
            tracing::error!("Failed to clear sessions: {}", e);
            ChatError::Backend(e)
        })?;
        self.new_chat().await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ChatError> {
        history::list_sessions(self.backend.as_ref()).await
    }

    fn set_locked(&mut self, locked: bool) {
        self.flush();
        self.surface.affordances_changed(locked);
    }

    /// Forward recorded transcript changes to the surface
    fn flush(&mut self) {
        for change in self.transcript.drain_changes() {
            match change {
                TranscriptChange::Appended(entry) => self.surface.entry_appended(&entry),
                TranscriptChange::Updated { id, text, delta } => {
                    self.surface.entry_updated(id, &text, &delta)
                }
                TranscriptChange::Closed(id) => self.surface.entry_closed(id),
                TranscriptChange::Removed(id) => self.surface.entry_removed(id),
                TranscriptChange::Cleared => self.surface.cleared(),
            }
        }
    }
}

impl Drop for ChatController {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.abort();
        }
    }
}
