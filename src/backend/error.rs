//! Typed errors for backend requests
//!
//! Distinguishes the ways a call to the chat backend can fail so callers can
//! log and recover without string matching.

use thiserror::Error;

/// Backend request errors
///
/// - `Rejected` - the envelope came back with `success: false`
/// - `Http` - non-success HTTP status
/// - `Network` - connection refused, timeout, broken stream
/// - `Decode` - body did not match the expected shape
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend answered but refused the operation
    #[error("Backend rejected request: {0}")]
    Rejected(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Network connectivity issue
    #[error("Network error: {0}")]
    Network(String),

    /// Unexpected response body
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether trying again later could succeed
    ///
    /// Nothing retries automatically; this only informs log levels and
    /// user-facing hints.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Network(_) => true,
            BackendError::Http { status, .. } => *status == 429 || *status >= 500,
            BackendError::Rejected(_) | BackendError::Decode(_) => false,
        }
    }

    /// Convert HTTP status code and body text into a typed error
    ///
    /// Bodies that are themselves `success: false` envelopes keep the
    /// backend's message rather than the raw JSON.
    pub fn from_http_status(status: reqwest::StatusCode, body: String) -> Self {
        let body = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error"))
                    .and_then(|m| m.as_str().map(str::to_string))
            })
            .unwrap_or(body);
        BackendError::Http {
            status: status.as_u16(),
            body,
        }
    }

    /// Convert reqwest failures into typed errors
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            BackendError::Network(format!("Connection failed: {}", e))
        } else if let Some(status) = e.status() {
            Self::from_http_status(status, e.to_string())
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        Self::from_network_error(e)
    }
}
