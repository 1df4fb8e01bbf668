// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// HTTP surface of the relay
//
// Responsibilities:
// - Parse and validate the client request before any upstream call
// - Dispatch to the injected UpstreamClient in buffered or streaming mode
// - Map failures onto 400/500/504 `{error, reply}` bodies
// - Serve reframed SSE for /stream_chat
// - Heartbeat endpoint

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::message::{ChatReply, ChatRequest, ErrorReply, UpstreamChatResponse, UpstreamPayload};
use crate::stream::{CozeChunkClassifier, Reframer, StreamEvent, OPEN_FAILED_MESSAGE};
use crate::upstream::ByteStream;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything that can fail while serving a chat request.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("upstream request timed out: {0}")]
    UpstreamTimeout(String),

    #[error("upstream request failed: {0}")]
    UpstreamFailure(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::EmptyMessage | RelayError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::UpstreamFailure(_) | RelayError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing body.
    pub fn reply(&self) -> ErrorReply {
        let (error, reply) = match self {
            RelayError::EmptyMessage => (
                "message must not be empty".to_string(),
                "Please enter a message.".to_string(),
            ),
            RelayError::MalformedRequest(detail) => (
                detail.clone(),
                "Please enter a message.".to_string(),
            ),
            RelayError::UpstreamTimeout(_) => (
                "request timed out".to_string(),
                "The reply is taking too long. Please try again later.".to_string(),
            ),
            RelayError::UpstreamFailure(detail) => (
                detail.clone(),
                "The chat service is temporarily unavailable. Please try again later."
                    .to_string(),
            ),
            RelayError::Unexpected(detail) => (
                "processing error".to_string(),
                format!("system error: {detail}"),
            ),
        };
        ErrorReply { error, reply }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.reply())).into_response()
    }
}

// ---------------------------------------------------------------------------
// Trait: UpstreamClient (dependency injection point)
// ---------------------------------------------------------------------------

/// The chat API as seen by the handlers.
///
/// Implementations must be Send + Sync so they can be shared across request
/// handlers via `Arc`.
#[async_trait::async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Buffered call; returns the parsed response body.
    async fn chat(&self, payload: UpstreamPayload) -> Result<UpstreamChatResponse, RelayError>;

    /// Streaming call; returns the raw SSE body once response headers are in.
    async fn open_stream(&self, payload: UpstreamPayload) -> Result<ByteStream, RelayError>;
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state injected into axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn UpstreamClient>,
    pub bot_id: Arc<str>,
    pub reframer: Arc<Reframer>,
}

impl AppState {
    /// `stream_idle_timeout` bounds each upstream read while streaming.
    pub fn new(
        upstream: Arc<dyn UpstreamClient>,
        bot_id: impl Into<Arc<str>>,
        stream_idle_timeout: Duration,
    ) -> Self {
        Self {
            upstream,
            bot_id: bot_id.into(),
            reframer: Arc::new(Reframer::new(
                Arc::new(CozeChunkClassifier),
                stream_idle_timeout,
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Heartbeat endpoint: GET /heartbeat -> 200 OK
pub async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

/// Parse the body and extract the trimmed query.
fn validate(body: &[u8]) -> Result<(String, ChatRequest), RelayError> {
    if body.is_empty() {
        return Err(RelayError::MalformedRequest("request body is empty".into()));
    }
    let request: ChatRequest = serde_json::from_slice(body)
        .map_err(|e| RelayError::MalformedRequest(format!("request body is not valid JSON: {e}")))?;
    let query = request.query().ok_or(RelayError::EmptyMessage)?.to_string();
    Ok((query, request))
}

/// POST /chat
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    let span = tracing::info_span!("chat", request_id = %Uuid::new_v4());
    async move {
        let (query, request) = match validate(&body) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "rejected chat request");
                return e.into_response();
            }
        };

        let payload = UpstreamPayload::new(&*state.bot_id, query, request.conversation_id(), false);
        match state.upstream.chat(payload).await {
            Ok(response) => {
                let reply = ChatReply::from_upstream(&response, request.conversation_id());
                tracing::info!(
                    reply_len = reply.reply.len(),
                    conversation_id = %reply.conversation_id,
                    "chat reply sent"
                );
                Json(reply).into_response()
            }
            Err(e) => {
                tracing::warn!(error = %e, status = %e.status(), "chat request failed");
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// POST /stream_chat
///
/// Validation failures are plain 400 JSON. Once validation passes the
/// response is always 200 SSE; upstream failures are reported as events.
pub async fn stream_chat(State(state): State<AppState>, body: Bytes) -> Response {
    let span = tracing::info_span!("stream_chat", request_id = %Uuid::new_v4());
    async move {
        let (query, request) = match validate(&body) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "rejected stream request");
                return e.into_response();
            }
        };

        let conversation_id = request.conversation_id().to_string();
        let payload = UpstreamPayload::new(&*state.bot_id, query, conversation_id.as_str(), true);

        let body = match state.upstream.open_stream(payload).await {
            Ok(upstream) => {
                tracing::debug!("upstream stream opened");
                let frames = state.reframer.process(upstream, conversation_id);
                Body::from_stream(frames.map(Ok::<Bytes, Infallible>))
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to open upstream stream");
                Body::from(StreamEvent::error(e.to_string(), OPEN_FAILED_MESSAGE).to_frame())
            }
        };

        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            body,
        )
            .into_response()
    }
    .instrument(span)
    .await
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// Build the axum router with the chat routes and the heartbeat endpoint.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/heartbeat", get(heartbeat))
        .route("/chat", post(chat))
        .route("/stream_chat", post(stream_chat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
