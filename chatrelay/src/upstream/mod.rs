// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Upstream chat API client
//
// - Serialize the payload and attach bearer auth + Accept header
// - Buffered mode: one POST bounded by the request timeout, JSON body parsed
// - Streaming mode: POST whose headers must arrive within the stream timeout;
//   the body is handed back unread as a byte stream
// - Non-2xx statuses become transport failures in both modes; at most
//   ERROR_BODY_LOG_LIMIT bytes of the error body are read, under the mode's
//   timeout

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream, StreamExt, TryStreamExt};

use crate::config::UpstreamConfig;
use crate::message::{UpstreamChatResponse, UpstreamPayload};
use crate::relay::{RelayError, UpstreamClient};

/// Upstream error bodies are logged up to this many bytes.
const ERROR_BODY_LOG_LIMIT: usize = 512;

// ---------------------------------------------------------------------------
// Transport interface
// ---------------------------------------------------------------------------

/// Sends HTTP requests to the chat API.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Upstream response body as a stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

/// A POST to the chat API.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Buffered: bounds the whole exchange. Streaming: bounds the wait for
    /// response headers only.
    pub timeout: Option<Duration>,
    /// Return the body as a stream instead of reading it fully.
    pub stream: bool,
}

pub enum HttpBody {
    Full(Bytes),
    Stream(ByteStream),
}

impl HttpBody {
    /// Read the whole body.
    pub async fn into_bytes(self) -> Result<Bytes, HttpError> {
        match self {
            HttpBody::Full(bytes) => Ok(bytes),
            HttpBody::Stream(mut s) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = s.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }

    /// View the body as a chunk stream.
    pub fn into_stream(self) -> ByteStream {
        match self {
            HttpBody::Full(bytes) => Box::pin(stream::once(async move { Ok(bytes) })),
            HttpBody::Stream(s) => s,
        }
    }
}

pub struct HttpResponse {
    pub status: StatusCode,
    /// Left unread for non-2xx statuses in both modes.
    pub body: HttpBody,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream request timed out: {0}")]
    Timeout(String),
}

impl From<HttpError> for RelayError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Transport(msg) => RelayError::UpstreamFailure(msg),
            HttpError::Timeout(msg) => RelayError::UpstreamTimeout(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// CozeClient
// ---------------------------------------------------------------------------

/// Upstream client for the Coze chat endpoint.
pub struct CozeClient {
    http: Arc<dyn HttpSender>,
    url: String,
    api_key: String,
    request_timeout: Duration,
    stream_timeout: Duration,
}

impl CozeClient {
    pub fn new(http: Arc<dyn HttpSender>, config: &UpstreamConfig) -> Self {
        Self {
            http,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout,
            stream_timeout: config.stream_timeout,
        }
    }

    fn request(&self, payload: &UpstreamPayload) -> Result<HttpRequest, RelayError> {
        let accept = if payload.stream {
            "text/event-stream"
        } else {
            "application/json"
        };

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| RelayError::Unexpected("api key is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static(accept));

        let body = serde_json::to_vec(payload)
            .map_err(|e| RelayError::Unexpected(format!("failed to encode payload: {e}")))?;

        Ok(HttpRequest {
            url: self.url.clone(),
            headers,
            body: Bytes::from(body),
            timeout: Some(if payload.stream {
                self.stream_timeout
            } else {
                self.request_timeout
            }),
            stream: payload.stream,
        })
    }

    async fn send(&self, payload: &UpstreamPayload) -> Result<HttpResponse, RelayError> {
        let request = self.request(payload)?;
        tracing::debug!(
            url = %request.url,
            stream = request.stream,
            user_id = %payload.user_id,
            new_conversation = payload.conversation_id.is_empty(),
            "sending chat request upstream"
        );

        let response = self.http.send(request).await?;
        if !response.status.is_success() {
            let status = response.status;
            let read_limit = if payload.stream {
                self.stream_timeout
            } else {
                self.request_timeout
            };
            // Dropping the body on return closes the upstream connection.
            match tokio::time::timeout(
                read_limit,
                read_prefix(response.body, ERROR_BODY_LOG_LIMIT),
            )
            .await
            {
                Ok(Ok(body)) => tracing::debug!(
                    %status,
                    body = %String::from_utf8_lossy(&body),
                    "upstream error body"
                ),
                Ok(Err(e)) => tracing::debug!(%status, error = %e, "unreadable upstream error body"),
                Err(_) => tracing::debug!(%status, "upstream error body stalled"),
            }
            return Err(RelayError::UpstreamFailure(format!(
                "upstream returned HTTP {status}"
            )));
        }
        Ok(response)
    }
}

/// Read at most `limit` bytes from the front of `body`.
async fn read_prefix(body: HttpBody, limit: usize) -> Result<Bytes, HttpError> {
    let mut chunks = body.into_stream();
    let mut buf = BytesMut::new();
    while buf.len() < limit {
        match chunks.next().await {
            Some(chunk) => buf.extend_from_slice(&chunk?),
            None => break,
        }
    }
    buf.truncate(limit);
    Ok(buf.freeze())
}

#[async_trait]
impl UpstreamClient for CozeClient {
    async fn chat(&self, payload: UpstreamPayload) -> Result<UpstreamChatResponse, RelayError> {
        let response = self.send(&payload).await?;
        let body = response.body.into_bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| RelayError::Unexpected(format!("invalid upstream response: {e}")))
    }

    async fn open_stream(&self, payload: UpstreamPayload) -> Result<ByteStream, RelayError> {
        let response = self.send(&payload).await?;
        Ok(response.body.into_stream())
    }
}

// ---------------------------------------------------------------------------
// Reqwest HTTP sender
// ---------------------------------------------------------------------------

pub struct ReqwestHttpSender {
    client: reqwest::Client,
}

impl ReqwestHttpSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        HttpError::Timeout(e.to_string())
    } else {
        HttpError::Transport(e.to_string())
    }
}

#[async_trait]
impl HttpSender for ReqwestHttpSender {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut req = self
            .client
            .post(&request.url)
            .headers(request.headers)
            .body(request.body);

        if request.stream {
            // reqwest's per-request timeout would also cap the body; only the
            // wait for headers is bounded here.
            let send = req.send();
            let resp = match request.timeout {
                Some(limit) => tokio::time::timeout(limit, send).await.map_err(|_| {
                    HttpError::Timeout(format!("no response within {}ms", limit.as_millis()))
                })?,
                None => send.await,
            }
            .map_err(classify_reqwest_error)?;

            let status = resp.status();
            let stream = resp.bytes_stream().map_err(classify_reqwest_error);
            Ok(HttpResponse {
                status,
                body: HttpBody::Stream(Box::pin(stream)),
            })
        } else {
            if let Some(limit) = request.timeout {
                req = req.timeout(limit);
            }
            let resp = req.send().await.map_err(classify_reqwest_error)?;

            let status = resp.status();
            if !status.is_success() {
                let stream = resp.bytes_stream().map_err(classify_reqwest_error);
                return Ok(HttpResponse {
                    status,
                    body: HttpBody::Stream(Box::pin(stream)),
                });
            }
            let body = resp.bytes().await.map_err(classify_reqwest_error)?;
            Ok(HttpResponse {
                status,
                body: HttpBody::Full(body),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Public factory
// ---------------------------------------------------------------------------

/// Build the production client: reqwest with the configured connect timeout.
pub fn build_coze_client(config: &UpstreamConfig) -> Result<CozeClient, reqwest::Error> {
    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .build()?;
    Ok(CozeClient::new(
        Arc::new(ReqwestHttpSender::new(client)),
        config,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn test_config() -> UpstreamConfig {
        UpstreamConfig {
            url: "https://chat.example/v1/chat".to_string(),
            api_key: "pat_test".to_string(),
            bot_id: "bot-1".to_string(),
            connect_timeout: Duration::from_millis(3050),
            request_timeout: Duration::from_secs(15),
            stream_timeout: Duration::from_secs(30),
        }
    }

    /// Records every request and answers with a canned response.
    struct CapturingSender {
        requests: Mutex<Vec<HttpRequest>>,
        status: StatusCode,
        body: Bytes,
        error: Option<HttpError>,
        /// Body yields nothing and never ends.
        stall_body: bool,
    }

    impl CapturingSender {
        fn ok(body: &str) -> Self {
            Self::with_status(StatusCode::OK, body)
        }

        fn with_status(status: StatusCode, body: &str) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                status,
                body: Bytes::copy_from_slice(body.as_bytes()),
                error: None,
                stall_body: false,
            }
        }

        fn stalled(status: StatusCode) -> Self {
            Self {
                stall_body: true,
                ..Self::with_status(status, "")
            }
        }

        fn failing(error: HttpError) -> Self {
            Self {
                error: Some(error),
                ..Self::ok("")
            }
        }

        fn last_request(&self) -> HttpRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl HttpSender for CapturingSender {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let stream = request.stream;
            self.requests.lock().unwrap().push(request);
            if let Some(err) = &self.error {
                return Err(err.clone());
            }
            let body = if self.stall_body {
                HttpBody::Stream(Box::pin(stream::pending::<Result<Bytes, HttpError>>()))
            } else if stream {
                HttpBody::Stream(Box::pin(stream::iter(vec![Ok(self.body.clone())])))
            } else {
                HttpBody::Full(self.body.clone())
            };
            Ok(HttpResponse {
                status: self.status,
                body,
            })
        }
    }

    fn client(sender: Arc<CapturingSender>) -> CozeClient {
        CozeClient::new(sender, &test_config())
    }

    #[tokio::test]
    async fn chat_sends_buffered_request() {
        let sender = Arc::new(CapturingSender::ok(r#"{"messages":[]}"#));
        let payload = UpstreamPayload::new("bot-1", "hello", "conv-1", false);

        client(sender.clone()).chat(payload).await.unwrap();

        let req = sender.last_request();
        assert_eq!(req.url, "https://chat.example/v1/chat");
        assert!(!req.stream);
        assert_eq!(req.timeout, Some(Duration::from_secs(15)));
        assert_eq!(req.headers.get(AUTHORIZATION).unwrap(), "Bearer pat_test");
        assert_eq!(req.headers.get(ACCEPT).unwrap(), "application/json");
        assert_eq!(req.headers.get(CONTENT_TYPE).unwrap(), "application/json");

        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["bot_id"], "bot-1");
        assert_eq!(body["query"], "hello");
        assert_eq!(body["conversation_id"], "conv-1");
        assert_eq!(body["stream"], false);
    }

    #[tokio::test]
    async fn chat_parses_upstream_body() {
        let sender = Arc::new(CapturingSender::ok(
            r#"{"messages":[{"type":"answer","content":"hi"}],"conversation_id":"c2"}"#,
        ));

        let resp = client(sender)
            .chat(UpstreamPayload::new("b", "q", "", false))
            .await
            .unwrap();

        assert_eq!(resp.first_answer(), Some("hi"));
        assert_eq!(resp.conversation_id.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn open_stream_requests_event_stream() {
        let sender = Arc::new(CapturingSender::ok("data: {}\n\n"));

        let mut body = client(sender.clone())
            .open_stream(UpstreamPayload::new("b", "q", "", true))
            .await
            .unwrap();

        let req = sender.last_request();
        assert!(req.stream);
        assert_eq!(req.timeout, Some(Duration::from_secs(30)));
        assert_eq!(req.headers.get(ACCEPT).unwrap(), "text/event-stream");
        let payload: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(payload["stream"], true);

        let chunk = body.next().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"data: {}\n\n");
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_failure() {
        let sender = Arc::new(CapturingSender::with_status(
            StatusCode::UNAUTHORIZED,
            r#"{"code":4100}"#,
        ));

        let err = client(sender)
            .chat(UpstreamPayload::new("b", "q", "", false))
            .await
            .unwrap_err();

        match err {
            RelayError::UpstreamFailure(msg) => assert!(msg.contains("401"), "got: {msg}"),
            other => panic!("expected UpstreamFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_success_status_fails_stream_open() {
        let sender = Arc::new(CapturingSender::with_status(StatusCode::BAD_GATEWAY, ""));

        let result = client(sender)
            .open_stream(UpstreamPayload::new("b", "q", "", true))
            .await;

        assert!(matches!(result, Err(RelayError::UpstreamFailure(_))));
    }

    #[tokio::test]
    async fn stalled_error_body_does_not_block_failure() {
        let config = UpstreamConfig {
            request_timeout: Duration::from_millis(100),
            stream_timeout: Duration::from_millis(100),
            ..test_config()
        };

        for streaming in [true, false] {
            let sender = Arc::new(CapturingSender::stalled(StatusCode::BAD_GATEWAY));
            let client = CozeClient::new(sender, &config);
            let payload = UpstreamPayload::new("b", "q", "", streaming);

            let err = tokio::time::timeout(Duration::from_secs(5), async {
                if streaming {
                    client.open_stream(payload).await.err()
                } else {
                    client.chat(payload).await.err()
                }
            })
            .await
            .expect("error body read should be bounded by the upstream timeout")
            .unwrap();

            match err {
                RelayError::UpstreamFailure(msg) => assert!(msg.contains("502"), "got: {msg}"),
                other => panic!("expected UpstreamFailure, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn read_prefix_stops_at_limit() {
        let chunks: Vec<Result<Bytes, HttpError>> = vec![
            Ok(Bytes::from(vec![b'a'; 400])),
            Ok(Bytes::from(vec![b'b'; 400])),
        ];
        // A third read would hang: the limit must be reached first.
        let body = HttpBody::Stream(Box::pin(stream::iter(chunks).chain(stream::pending())));

        let prefix = read_prefix(body, ERROR_BODY_LOG_LIMIT).await.unwrap();
        assert_eq!(prefix.len(), ERROR_BODY_LOG_LIMIT);
        assert_eq!(&prefix[..400], &[b'a'; 400][..]);
    }

    #[tokio::test]
    async fn timeout_maps_to_upstream_timeout() {
        let sender = Arc::new(CapturingSender::failing(HttpError::Timeout(
            "operation timed out".into(),
        )));

        let err = client(sender)
            .chat(UpstreamPayload::new("b", "q", "", false))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::UpstreamTimeout(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn transport_error_maps_to_upstream_failure() {
        let sender = Arc::new(CapturingSender::failing(HttpError::Transport(
            "connection refused".into(),
        )));

        let err = client(sender)
            .open_stream(UpstreamPayload::new("b", "q", "", true))
            .await
            .err()
            .unwrap();

        match err {
            RelayError::UpstreamFailure(msg) => assert_eq!(msg, "connection refused"),
            other => panic!("expected UpstreamFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_is_unexpected() {
        let sender = Arc::new(CapturingSender::ok("<html>gateway</html>"));

        let err = client(sender)
            .chat(UpstreamPayload::new("b", "q", "", false))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Unexpected(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn http_body_into_bytes_collects_stream() {
        let chunks = vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))];
        let body = HttpBody::Stream(Box::pin(stream::iter(chunks)));
        assert_eq!(body.into_bytes().await.unwrap(), Bytes::from_static(b"abcd"));
    }

    #[tokio::test]
    async fn http_body_into_bytes_propagates_error() {
        let chunks = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(HttpError::Transport("reset".into())),
        ];
        let body = HttpBody::Stream(Box::pin(stream::iter(chunks)));
        assert!(body.into_bytes().await.is_err());
    }

    #[test]
    fn http_error_timeout_formats_correctly() {
        let err = HttpError::Timeout("request timed out after 15000ms".to_string());
        assert_eq!(
            err.to_string(),
            "upstream request timed out: request timed out after 15000ms"
        );
    }

    #[test]
    fn http_error_transport_formats_correctly() {
        let err = HttpError::Transport("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "upstream request failed: connection refused"
        );
    }
}
