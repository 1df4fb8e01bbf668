// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Stream types
//
// Events emitted to the client, the classifier's view of one upstream
// payload, and the fixed explanatory messages carried by error events.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Explanation attached when the upstream stream could not be opened.
pub const OPEN_FAILED_MESSAGE: &str = "request to the chat API failed";

/// Explanation attached when the upstream stream broke after it was opened.
pub const INTERRUPTED_MESSAGE: &str = "the chat API stream was interrupted";

// ---------------------------------------------------------------------------
// Client-facing events
// ---------------------------------------------------------------------------

/// One event in the normalized stream sent to the client.
///
/// Serialized without a tag: the field set identifies the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEvent {
    /// A delta of the answer (not the accumulated text).
    Content { content: String },
    /// Final event of a successful stream.
    Done {
        done: bool,
        full_content: String,
        conversation_id: String,
    },
    /// Upstream failure; always the last event of its stream.
    Error { error: String, message: String },
}

impl StreamEvent {
    pub fn content(delta: impl Into<String>) -> Self {
        StreamEvent::Content {
            content: delta.into(),
        }
    }

    pub fn done(full_content: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        StreamEvent::Done {
            done: true,
            full_content: full_content.into(),
            conversation_id: conversation_id.into(),
        }
    }

    pub fn error(error: impl Into<String>, message: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: error.into(),
            message: message.into(),
        }
    }

    /// Encode as a single SSE frame: `data: <json>\n\n`.
    pub fn to_frame(&self) -> Bytes {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        Bytes::from(format!("data: {json}\n\n"))
    }
}

// ---------------------------------------------------------------------------
// Upstream payload classification
// ---------------------------------------------------------------------------

/// What the reframer needs to know about one parsed upstream `data:` payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classified {
    /// Answer text carried by this event, if it is an answer-type message.
    pub answer_delta: Option<String>,
    /// Conversation id carried by this event, whatever its type.
    pub conversation_id: Option<String>,
}
