//! Server-Sent Events decoding for the response channel
//!
//! The response stream carries raw text chunks, so payload whitespace is
//! significant: only the single optional space after `data:` is stripped.

use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;

use super::error::BackendError;

/// Server-Sent Events (SSE) decoder
///
/// Buffers incoming bytes and yields the data of each complete event.
/// Handles:
/// - Events split across multiple network chunks
/// - Multiple events in a single chunk
/// - `\r\n` line endings
/// - Multi-line `data:` fields (joined with `\n`)
/// - Final event without trailing blank line (see [`SseDecoder::finish`])
///
/// # Example
/// ```
/// use companion_chat::backend::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// assert_eq!(decoder.push(b"data: Hel"), Vec::<String>::new());
/// assert_eq!(decoder.push(b"lo\n\ndata:  world\n\n"), vec!["Hello", " world"]);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    data: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push incoming bytes and return the payloads of completed events
    ///
    /// Incomplete lines stay buffered for the next `push()` or `finish()`.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut events = Vec::new();

        for &byte in bytes {
            if byte == b'\n' {
                let mut line = std::mem::take(&mut self.line);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if let Some(event) = self.process_line(&line) {
                    events.push(event);
                }
            } else {
                self.line.push(byte);
            }
        }

        events
    }

    /// Flush whatever is buffered when the byte stream ends
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.line.is_empty() {
            let mut line = std::mem::take(&mut self.line);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        if let Some(data) = self.data.take() {
            events.push(data);
        }
        events
    }

    fn process_line(&mut self, line: &[u8]) -> Option<String> {
        // Blank line dispatches the pending event
        if line.is_empty() {
            return self.data.take();
        }

        // Comment / keep-alive
        if line[0] == b':' {
            return None;
        }

        let line = String::from_utf8_lossy(line);
        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (&line[..], ""),
        };

        if field == "data" {
            match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        }

        None
    }
}

/// Adapt a byte stream into a stream of SSE payloads
///
/// Transport errors end the stream after being yielded once.
pub fn decode_sse<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, BackendError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<BackendError> + Send,
{
    struct State<S> {
        bytes: S,
        decoder: SseDecoder,
        pending: VecDeque<String>,
        done: bool,
    }

    let state = State {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(payload) = state.pending.pop_front() {
                return Some((Ok(payload), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(chunk.as_ref());
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.done = true;
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_event() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.push(b"data: Hello\n\n"), vec!["Hello"]);
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: Hel\n\ndata: lo\n\n");
        assert_eq!(payloads, vec!["Hel", "lo"]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"da").is_empty());
        assert!(decoder.push(b"ta: wor").is_empty());
        assert_eq!(decoder.push(b"ld\n\n"), vec!["world"]);
    }

    #[test]
    fn test_leading_whitespace_is_preserved() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data:  world\n\ndata:nospace\n\n");
        assert_eq!(payloads, vec![" world", "nospace"]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.push(b"data: a\r\n\r\n"), vec!["a"]);
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.push(b"data: one\ndata: two\n\n"), vec!["one\ntwo"]);
    }

    #[test]
    fn test_empty_data_is_emitted_as_empty_payload() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.push(b"data:\n\n"), vec![""]);
    }

    #[test]
    fn test_comments_and_other_fields_ignored() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b": keep-alive\n\nevent: message\nid: 4\ndata: x\n\n");
        assert_eq!(payloads, vec!["x"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.push(b"data: a\n\ndata: b"), vec!["a"]);
        assert_eq!(decoder.finish(), vec!["b"]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_multibyte_utf8_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: caffè\n\n".as_bytes();
        let split = bytes.len() - 3;
        assert!(decoder.push(&bytes[..split]).is_empty());
        assert_eq!(decoder.push(&bytes[split..]), vec!["caffè"]);
    }

    #[tokio::test]
    async fn test_decode_sse_stream_flushes_and_stops_on_error() {
        let chunks: Vec<Result<Vec<u8>, BackendError>> = vec![
            Ok(b"data: Hel\n\ndata: lo".to_vec()),
            Ok(b"\n\n".to_vec()),
            Err(BackendError::Network("reset".into())),
            Ok(b"data: never\n\n".to_vec()),
        ];
        let out: Vec<_> = decode_sse(stream::iter(chunks)).collect().await;

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_ref().unwrap(), "Hel");
        assert_eq!(out[1].as_ref().unwrap(), "lo");
        assert!(matches!(out[2], Err(BackendError::Network(_))));
    }

    #[tokio::test]
    async fn test_decode_sse_stream_flushes_trailing_event() {
        let chunks: Vec<Result<Vec<u8>, BackendError>> = vec![Ok(b"data: tail".to_vec())];
        let out: Vec<_> = decode_sse(stream::iter(chunks)).collect().await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap(), "tail");
    }
}
