//! Wire types shared by every backend endpoint

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::error::BackendError;

/// Opaque, server-assigned session identifier
///
/// Backends hand these out as either JSON strings or integers; both are kept
/// in their textual form so the client never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Ok(SessionId(s)),
            Raw::Int(n) => Ok(SessionId(n.to_string())),
        }
    }
}

/// Uniform `{ success, message }` reply wrapper used by all JSON endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: T,
}

impl<T> Envelope<T> {
    pub fn ok(message: T) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

impl Envelope<serde_json::Value> {
    /// Short-circuit a `success: false` envelope into a typed error,
    /// otherwise decode the payload as `T`.
    pub fn into_result<T: serde::de::DeserializeOwned>(self) -> Result<T, BackendError> {
        if !self.success {
            return Err(BackendError::Rejected(describe_message(&self.message)));
        }
        serde_json::from_value(self.message).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

fn describe_message(message: &serde_json::Value) -> String {
    match message {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "no details".to_string(),
        other => other.to_string(),
    }
}

/// Reply of the create-session endpoint
///
/// Older backends answer `{ "session_id": ... }` without the envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CreateSessionReply {
    Envelope(Envelope<serde_json::Value>),
    Legacy { session_id: SessionId },
}

impl CreateSessionReply {
    pub(crate) fn into_session_id(self) -> Result<SessionId, BackendError> {
        match self {
            CreateSessionReply::Envelope(envelope) => envelope.into_result(),
            CreateSessionReply::Legacy { session_id } => Ok(session_id),
        }
    }
}

/// Body of the send-prompt endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
}

/// Body of the session-history endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub session_id: SessionId,
}

/// One row of the session listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: SessionId,
    /// `None` when the backend has no usable creation time
    pub created_at: Option<NaiveDateTime>,
}

/// Sentinel some backends store when a chat has no timestamp
const UNKNOWN_TIMESTAMP: &str = "0001-01-01T00:00:00";

impl SessionSummary {
    /// Human-readable creation time, or `Unknown Date`
    pub fn display_date(&self) -> String {
        match self.created_at {
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "Unknown Date".to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for SessionSummary {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (id, raw_ts): (SessionId, Option<String>) = Deserialize::deserialize(deserializer)?;
        Ok(SessionSummary {
            id,
            created_at: raw_ts.as_deref().and_then(parse_timestamp),
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() || raw == UNKNOWN_TIMESTAMP {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Stored prompt/response arrays of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHistory {
    #[serde(default)]
    pub user: Vec<String>,
    #[serde(default, rename = "assistantAI")]
    pub assistant: Vec<String>,
}
