//! HTTP implementation of [`ChatBackend`]

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use super::{
    decode_sse, BackendError, ChatBackend, ChunkStream, CreateSessionReply, Envelope,
    HistoryRequest, PromptRequest, SessionHistory, SessionId, SessionSummary,
};
use crate::config::{BackendConfig, EndpointsConfig};

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    endpoints: EndpointsConfig,
    request_timeout: std::time::Duration,
}

impl HttpBackend {
    /// Create a client for the configured backend
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            endpoints: config.endpoints.clone(),
            request_timeout: config.request_timeout(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::Decode(format!("Invalid endpoint {}: {}", path, e)))
    }

    /// POST a JSON body (or nothing) and decode the reply envelope
    async fn post_envelope<B, T>(&self, path: &str, body: Option<&B>) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let envelope: Envelope<serde_json::Value> = self.post_json(path, body).await?;
        envelope.into_result()
    }

    async fn post_json<B, T>(&self, path: &str, body: Option<&B>) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        tracing::debug!("POST {}", url);

        let mut request = self.client.post(url).timeout(self.request_timeout);
        request = match body {
            Some(body) => request.json(body),
            None => request.header(reqwest::header::CONTENT_TYPE, "application/json"),
        };

        let response = request
            .send()
            .await
            .map_err(BackendError::from_network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_http_status(status, body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn create_session(&self) -> Result<SessionId, BackendError> {
        let reply: CreateSessionReply = self
            .post_json::<(), _>(&self.endpoints.create_session, None)
            .await?;
        reply.into_session_id()
    }

    async fn send_prompt(&self, session: &SessionId, prompt: &str) -> Result<(), BackendError> {
        let body = PromptRequest {
            prompt: prompt.to_string(),
            session_id: session.clone(),
        };
        let _ack: serde_json::Value = self
            .post_envelope(&self.endpoints.send_prompt, Some(&body))
            .await?;
        Ok(())
    }

    async fn open_stream(&self, session: &SessionId) -> Result<ChunkStream, BackendError> {
        let url = self.url(&self.endpoints.stream_response)?;
        tracing::debug!("GET {} (session {})", url, session);

        // No overall timeout: the stream stays open for the whole reply and
        // idleness is policed by the consumer.
        let response = self
            .client
            .get(url)
            .query(&[("session_id", session.as_str())])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(BackendError::from_network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_http_status(status, body));
        }

        Ok(Box::pin(decode_sse(Box::pin(response.bytes_stream()))))
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError> {
        self.post_envelope::<(), _>(&self.endpoints.list_sessions, None)
            .await
    }

    async fn session_history(&self, session: &SessionId) -> Result<SessionHistory, BackendError> {
        let body = HistoryRequest {
            session_id: session.clone(),
        };
        self.post_envelope(&self.endpoints.session_history, Some(&body))
            .await
    }

    async fn clear_sessions(&self) -> Result<(), BackendError> {
        let _ack: serde_json::Value = self
            .post_envelope::<(), _>(&self.endpoints.clear_sessions, None)
            .await?;
        Ok(())
    }
}
