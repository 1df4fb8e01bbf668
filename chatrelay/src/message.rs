// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Wire types for both sides of the relay.
//
// Client side: ChatRequest in, ChatReply / ErrorReply out.
// Upstream side: UpstreamPayload out, UpstreamChatResponse in.
// Streaming events live in `crate::stream`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upstream message type that carries user-facing reply text.
pub const ANSWER_TYPE: &str = "answer";

// ---------------------------------------------------------------------------
// Client-facing types
// ---------------------------------------------------------------------------

/// Body of `POST /chat` and `POST /stream_chat`.
///
/// Both fields are optional on the wire: a missing `message` validates as
/// empty, and a missing or null `conversation_id` starts a new conversation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    /// The message with surrounding whitespace removed, or `None` if nothing is left.
    pub fn query(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    /// The opaque conversation id, empty for a new conversation.
    pub fn conversation_id(&self) -> &str {
        self.conversation_id.as_deref().unwrap_or("")
    }
}

/// Successful `POST /chat` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub conversation_id: String,
    /// Unix epoch seconds at the time the reply was formatted.
    pub timestamp: i64,
}

impl ChatReply {
    /// Format an upstream response into the client envelope.
    ///
    /// The upstream conversation id wins; `fallback_conversation_id` (the one
    /// the client sent) is echoed back only when upstream omits it.
    pub fn from_upstream(response: &UpstreamChatResponse, fallback_conversation_id: &str) -> Self {
        Self {
            reply: response.first_answer().unwrap_or_default().to_string(),
            conversation_id: response
                .conversation_id
                .clone()
                .unwrap_or_else(|| fallback_conversation_id.to_string()),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Body of every non-2xx JSON response: a technical error plus a
/// user-presentable fallback reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
    pub reply: String,
}

// ---------------------------------------------------------------------------
// Upstream-facing types
// ---------------------------------------------------------------------------

/// Request body sent to the chat API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamPayload {
    pub bot_id: String,
    pub user_id: String,
    pub query: String,
    pub conversation_id: String,
    pub stream: bool,
}

impl UpstreamPayload {
    pub fn new(
        bot_id: impl Into<String>,
        query: impl Into<String>,
        conversation_id: impl Into<String>,
        stream: bool,
    ) -> Self {
        Self {
            bot_id: bot_id.into(),
            user_id: new_user_id(),
            query: query.into(),
            conversation_id: conversation_id.into(),
            stream,
        }
    }
}

/// A fresh upstream user id, unique per request.
pub fn new_user_id() -> String {
    format!("user_{}", Uuid::new_v4().simple())
}

/// Buffered (non-streaming) chat API response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpstreamChatResponse {
    #[serde(default)]
    pub messages: Option<Vec<UpstreamMessage>>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// One entry of `UpstreamChatResponse::messages`.
///
/// `type` is required: an entry without it is a malformed response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpstreamMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: String,
}

impl UpstreamChatResponse {
    /// Content of the first answer-type message. Later answers are ignored.
    pub fn first_answer(&self) -> Option<&str> {
        self.messages
            .as_deref()?
            .iter()
            .find(|m| m.kind == ANSWER_TYPE)
            .map(|m| m.content.as_str())
    }
}
