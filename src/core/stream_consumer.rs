//! Stream Consumer - reads one exchange's response channel
//!
//! [`StreamConsumer::attach`] spawns a reader that forwards every payload as
//! a [`ClientEvent::StreamChunk`] and finishes with exactly one
//! [`ClientEvent::StreamClosed`], whether the channel ended cleanly, failed,
//! or went idle. [`ResponseAccumulator`] applies those payloads to the
//! transcript.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::errors::TranscriptError;
use super::events::{ClientEvent, EventSender, ExchangeId};
use super::indicator::ThinkingIndicator;
use super::transcript::{EntryRef, Role, Transcript};
use crate::backend::{ChatBackend, SessionId};

/// One open response channel, bound to a session and an exchange
///
/// Dropping the handle closes the channel.
#[derive(Debug)]
pub struct StreamHandle {
    session: SessionId,
    exchange: ExchangeId,
    task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    pub fn is_open(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop reading; no further events are emitted for this exchange
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Closed stream for exchange {}", self.exchange);
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct StreamConsumer {
    backend: Arc<dyn ChatBackend>,
    idle_timeout: Duration,
}

impl StreamConsumer {
    pub fn new(backend: Arc<dyn ChatBackend>, idle_timeout: Duration) -> Self {
        Self {
            backend,
            idle_timeout,
        }
    }

    /// Open the push channel for `session` and start forwarding payloads
    pub fn attach(
        &self,
        session: SessionId,
        exchange: ExchangeId,
        events: &EventSender,
    ) -> StreamHandle {
        let backend = Arc::clone(&self.backend);
        let idle_timeout = self.idle_timeout;
        let tx = events.clone();
        let stream_session = session.clone();

        let task = tokio::spawn(async move {
            let error = read_stream(backend, &stream_session, exchange, idle_timeout, &tx).await;
            let _ = tx.send(ClientEvent::StreamClosed { exchange, error });
        });

        StreamHandle {
            session,
            exchange,
            task: Some(task),
        }
    }
}

/// Pump the channel; returns the failure description, if any
async fn read_stream(
    backend: Arc<dyn ChatBackend>,
    session: &SessionId,
    exchange: ExchangeId,
    idle_timeout: Duration,
    tx: &EventSender,
) -> Option<String> {
    let mut stream = match backend.open_stream(session).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("Failed to open response stream: {}", e);
            return Some(e.to_string());
        }
    };

    loop {
        match tokio::time::timeout(idle_timeout, stream.next()).await {
            Ok(Some(Ok(payload))) => {
                tracing::trace!("Exchange {} chunk: {:?}", exchange, payload);
                if tx
                    .send(ClientEvent::StreamChunk { exchange, payload })
                    .is_err()
                {
                    // Receiver gone; nobody is listening anymore
                    return None;
                }
            }
            Ok(Some(Err(e))) => {
                tracing::warn!("Response stream error: {}", e);
                return Some(e.to_string());
            }
            Ok(None) => return None,
            Err(_) => {
                tracing::warn!(
                    "Response stream idle for {}s; closing",
                    idle_timeout.as_secs()
                );
                return Some(format!(
                    "no data for {} seconds",
                    idle_timeout.as_secs()
                ));
            }
        }
    }
}

/// What applying a payload did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Empty payload, nothing changed
    Ignored,
    /// First token: placeholder hidden, assistant entry created
    Started(EntryRef),
    /// Appended to the existing assistant entry
    Appended(EntryRef),
}

/// First-token vs. subsequent-token policy for one exchange
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    entry: Option<EntryRef>,
    text: String,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self) -> Option<EntryRef> {
        self.entry
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn apply(
        &mut self,
        payload: &str,
        transcript: &mut Transcript,
        indicator: &mut ThinkingIndicator,
    ) -> Result<ChunkOutcome, TranscriptError> {
        if payload.is_empty() {
            return Ok(ChunkOutcome::Ignored);
        }

        match self.entry {
            None => {
                indicator.hide(transcript);
                let entry = transcript.append(Role::Assistant, payload);
                self.entry = Some(entry);
                self.text.push_str(payload);
                Ok(ChunkOutcome::Started(entry))
            }
            Some(entry) => {
                transcript.append_chunk(entry, payload)?;
                self.text.push_str(payload);
                Ok(ChunkOutcome::Appended(entry))
            }
        }
    }

    /// Terminal signal: hide the placeholder, freeze the reply
    ///
    /// Returns the full reply text when at least one token arrived.
    pub fn finish(
        &mut self,
        transcript: &mut Transcript,
        indicator: &mut ThinkingIndicator,
    ) -> Option<String> {
        indicator.hide(transcript);
        let entry = self.entry.take()?;
        transcript.close(entry);
        Some(std::mem::take(&mut self.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::config::IndicatorConfig;
    use crate::core::test_support::ScriptedBackend;
    use tokio::sync::mpsc;

    fn setup() -> (Transcript, ThinkingIndicator, EventSender) {
        let (tx, _rx) = mpsc::unbounded_channel();
        (
            Transcript::new(),
            ThinkingIndicator::new(IndicatorConfig::default()),
            tx,
        )
    }

    #[tokio::test]
    async fn chunks_accumulate_into_one_entry() {
        let (mut transcript, mut indicator, tx) = setup();
        transcript.append(Role::User, "hi");
        indicator.show(&mut transcript, &tx);

        let mut acc = ResponseAccumulator::new();
        for chunk in ["Hel", "lo", " world"] {
            acc.apply(chunk, &mut transcript, &mut indicator).unwrap();
        }
        let reply = acc.finish(&mut transcript, &mut indicator);

        assert_eq!(reply.as_deref(), Some("Hello world"));
        let messages: Vec<_> = transcript.messages().collect();
        assert_eq!(
            messages,
            vec![(Role::User, "hi"), (Role::Assistant, "Hello world")]
        );
        assert_eq!(transcript.placeholder_count(), 0);
        assert!(!transcript.last().unwrap().is_open());
    }

    #[tokio::test]
    async fn first_token_replaces_placeholder() {
        let (mut transcript, mut indicator, tx) = setup();
        indicator.show(&mut transcript, &tx);

        let mut acc = ResponseAccumulator::new();
        let outcome = acc.apply("Hi", &mut transcript, &mut indicator).unwrap();

        assert!(matches!(outcome, ChunkOutcome::Started(_)));
        assert!(!indicator.is_visible());
        assert_eq!(transcript.len(), 1);
        assert_eq!(indicator.timer_cancellations(), 1);
    }

    #[tokio::test]
    async fn empty_payloads_are_ignored() {
        let (mut transcript, mut indicator, tx) = setup();
        indicator.show(&mut transcript, &tx);

        let mut acc = ResponseAccumulator::new();
        assert_eq!(
            acc.apply("", &mut transcript, &mut indicator).unwrap(),
            ChunkOutcome::Ignored
        );
        assert!(indicator.is_visible());
        assert_eq!(acc.entry(), None);
    }

    #[tokio::test]
    async fn tokenless_stream_leaves_no_assistant_entry() {
        let (mut transcript, mut indicator, tx) = setup();
        transcript.append(Role::User, "hi");
        indicator.show(&mut transcript, &tx);

        let mut acc = ResponseAccumulator::new();
        assert_eq!(acc.finish(&mut transcript, &mut indicator), None);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.placeholder_count(), 0);
        assert_eq!(indicator.timer_cancellations(), 1);
    }

    async fn collect_events(backend: Arc<ScriptedBackend>, idle: Duration) -> Vec<ClientEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let consumer = StreamConsumer::new(backend, idle);
        let _handle = consumer.attach(SessionId::new("s"), ExchangeId(1), &tx);

        let mut out = Vec::new();
        while let Some(event) = rx.recv().await {
            let closed = matches!(event, ClientEvent::StreamClosed { .. });
            out.push(event);
            if closed {
                break;
            }
        }
        out
    }

    #[tokio::test]
    async fn attach_forwards_chunks_then_close() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script_reply(&["a", "", "b"]);

        let events = collect_events(backend, Duration::from_secs(5)).await;
        let payloads: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ClientEvent::StreamChunk { payload, .. } => Some(payload.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(payloads, vec!["a", "", "b"]);
        assert!(matches!(
            events.last(),
            Some(ClientEvent::StreamClosed { error: None, .. })
        ));
    }

    #[tokio::test]
    async fn transport_error_is_reported_on_close() {
        let backend = Arc::new(ScriptedBackend::new());
        let tx = backend.open_reply();
        tx.send(Ok("partial".into())).unwrap();
        tx.send(Err(BackendError::Network("reset".into()))).unwrap();

        let events = collect_events(backend, Duration::from_secs(5)).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events.last(),
            Some(ClientEvent::StreamClosed { error: Some(_), .. })
        ));
    }

    #[tokio::test]
    async fn open_failure_is_reported_on_close() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.fail_open(true);

        let events = collect_events(backend, Duration::from_secs(5)).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ClientEvent::StreamClosed { error: Some(e), .. } if e.contains("400")
        ));
    }

    #[tokio::test]
    async fn idle_stream_times_out() {
        let backend = Arc::new(ScriptedBackend::new());
        let _held_open = backend.open_reply();

        let events = collect_events(backend, Duration::from_millis(20)).await;
        assert!(matches!(
            &events[0],
            ClientEvent::StreamClosed { error: Some(e), .. } if e.contains("no data")
        ));
    }

    #[tokio::test]
    async fn closing_handle_stops_events() {
        let backend = Arc::new(ScriptedBackend::new());
        let feed = backend.open_reply();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let consumer = StreamConsumer::new(backend, Duration::from_secs(5));
        let mut handle = consumer.attach(SessionId::new("s"), ExchangeId(7), &tx);

        handle.close();
        assert!(!handle.is_open());
        let _ = feed.send(Ok("late".into()));
        drop(tx);

        // The aborted reader never ran, so the channel just closes
        assert!(rx.recv().await.is_none());
    }
}
