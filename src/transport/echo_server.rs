//! Local echo backend
//!
//! Implements every chat endpoint with the `{ success, message }` envelope and
//! keeps chats in memory. Replies are `Echo: <prompt>`, streamed word by word
//! over `text/event-stream`. Useful for exercising the client without a model.

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDateTime, Utc};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

use crate::backend::{Envelope, HistoryRequest, PromptRequest, SessionHistory};
use crate::config::EndpointsConfig;

/// Pause between streamed words
const CHUNK_DELAY: Duration = Duration::from_millis(25);

struct StoredChat {
    history: SessionHistory,
    created_at: NaiveDateTime,
}

#[derive(Default)]
struct EchoState {
    chats: RwLock<HashMap<String, StoredChat>>,
}

impl EchoState {
    async fn record_reply(&self, session_id: &str, reply: String) {
        if let Some(chat) = self.chats.write().await.get_mut(session_id) {
            chat.history.assistant.push(reply);
        }
    }
}

type Shared = Arc<EchoState>;
type Rejection = (StatusCode, Json<Envelope<String>>);

fn reject(status: StatusCode, message: &str) -> Rejection {
    (
        status,
        Json(Envelope {
            success: false,
            message: message.to_string(),
        }),
    )
}

fn invalid_session() -> Rejection {
    reject(StatusCode::BAD_REQUEST, "Invalid session_id")
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    session_id: Option<String>,
}

/// Router serving the given endpoint paths
pub fn router(endpoints: &EndpointsConfig) -> Router {
    let state: Shared = Arc::new(EchoState::default());

    Router::new()
        .route(&endpoints.create_session, post(start_chat))
        .route(&endpoints.send_prompt, post(send_prompt))
        .route(&endpoints.stream_response, get(stream_response))
        .route(&endpoints.list_sessions, post(list_chats))
        .route(&endpoints.session_history, post(get_chat))
        .route(&endpoints.clear_sessions, post(clear_chats))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve on an already bound listener
pub async fn serve(listener: TcpListener, endpoints: &EndpointsConfig) -> Result<()> {
    axum::serve(listener, router(endpoints)).await?;
    Ok(())
}

/// Run the echo backend until the process is stopped
pub async fn run_echo_server(host: &str, port: u16, endpoints: &EndpointsConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Echo backend listening on {}", listener.local_addr()?);
    serve(listener, endpoints).await
}

async fn start_chat(State(state): State<Shared>) -> Json<Envelope<String>> {
    let id = uuid::Uuid::new_v4().to_string();
    state.chats.write().await.insert(
        id.clone(),
        StoredChat {
            history: SessionHistory::default(),
            created_at: Utc::now().naive_utc(),
        },
    );
    tracing::debug!("Started chat {}", id);
    Json(Envelope::ok(id))
}

async fn send_prompt(
    State(state): State<Shared>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<Envelope<String>>, Rejection> {
    let mut chats = state.chats.write().await;
    let chat = chats
        .get_mut(request.session_id.as_str())
        .ok_or_else(invalid_session)?;
    chat.history.user.push(request.prompt.trim().to_string());
    Ok(Json(Envelope::ok("Prompt received".to_string())))
}

async fn stream_response(
    State(state): State<Shared>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Rejection> {
    let session_id = query.session_id.ok_or_else(invalid_session)?;

    let pending = {
        let chats = state.chats.read().await;
        let chat = chats.get(&session_id).ok_or_else(invalid_session)?;
        let history = &chat.history;
        if history.user.len() > history.assistant.len() {
            history.user.last().cloned()
        } else {
            None
        }
    };

    let (words, reply) = match pending {
        Some(prompt) => {
            let reply = format!("Echo: {}", prompt);
            let words: Vec<String> = reply.split_inclusive(' ').map(str::to_string).collect();
            (words, Some(reply))
        }
        None => (Vec::new(), None),
    };

    let chunks = stream::iter(words).then(|word| async move {
        tokio::time::sleep(CHUNK_DELAY).await;
        Ok::<_, Infallible>(Event::default().data(word))
    });
    let finish = stream::once(async move {
        if let Some(reply) = reply {
            state.record_reply(&session_id, reply).await;
        }
        None::<Result<Event, Infallible>>
    })
    .filter_map(futures::future::ready);

    Ok(Sse::new(chunks.chain(finish)).keep_alive(KeepAlive::default()))
}

async fn list_chats(State(state): State<Shared>) -> Json<Envelope<Vec<(String, String)>>> {
    let chats = state.chats.read().await;
    let mut rows: Vec<(&String, &NaiveDateTime)> =
        chats.iter().map(|(id, chat)| (id, &chat.created_at)).collect();
    // Newest first
    rows.sort_by(|a, b| b.1.cmp(a.1));

    Json(Envelope::ok(
        rows.into_iter()
            .map(|(id, ts)| (id.clone(), ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()))
            .collect(),
    ))
}

async fn get_chat(
    State(state): State<Shared>,
    Json(request): Json<HistoryRequest>,
) -> Result<Json<Envelope<SessionHistory>>, Rejection> {
    let chats = state.chats.read().await;
    let chat = chats
        .get(request.session_id.as_str())
        .ok_or_else(invalid_session)?;
    Ok(Json(Envelope::ok(chat.history.clone())))
}

async fn clear_chats(State(state): State<Shared>) -> Json<Envelope<String>> {
    let removed = {
        let mut chats = state.chats.write().await;
        let n = chats.len();
        chats.clear();
        n
    };
    tracing::info!("Cleared {} chats", removed);
    Json(Envelope::ok("All chats cleared".to_string()))
}
