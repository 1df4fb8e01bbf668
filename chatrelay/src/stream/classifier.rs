// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Upstream event classification
//
// Decide what each parsed upstream payload contributes to the relayed
// stream: an answer delta, a conversation id, both, or nothing.

use serde_json::Value;

use super::types::Classified;
use crate::message::ANSWER_TYPE;

// ---------------------------------------------------------------------------
// Trait: ChunkClassifier
// ---------------------------------------------------------------------------

/// Interprets one parsed upstream `data:` payload.
///
/// Implementations understand a specific upstream event format. Payloads
/// handed to `classify` are always JSON objects.
pub trait ChunkClassifier: Send + Sync {
    fn classify(&self, payload: &Value) -> Classified;
}

// ---------------------------------------------------------------------------
// Coze classifier
// ---------------------------------------------------------------------------

/// Classifies Coze chat stream events.
///
/// Format:
/// - `{"event":"message","message":{"type":"answer","content":"He"}}` -> delta "He"
/// - `{"event":"message","message":{"type":"verbose",...}}` -> nothing
/// - `{"event":"done","conversation_id":"c1"}` -> conversation id only
///
/// A `conversation_id` field is picked up from any event type.
pub struct CozeChunkClassifier;

impl ChunkClassifier for CozeChunkClassifier {
    fn classify(&self, payload: &Value) -> Classified {
        let answer_delta = if payload.get("event").and_then(Value::as_str) == Some("message") {
            let message = payload.get("message");
            let kind = message.and_then(|m| m.get("type")).and_then(Value::as_str);
            if kind == Some(ANSWER_TYPE) {
                let content = message
                    .and_then(|m| m.get("content"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                Some(content.to_string())
            } else {
                None
            }
        } else {
            None
        };

        let conversation_id = payload
            .get("conversation_id")
            .and_then(Value::as_str)
            .map(String::from);

        Classified {
            answer_delta,
            conversation_id,
        }
    }
}

// ---------------------------------------------------------------------------
// SSE line parsing
// ---------------------------------------------------------------------------

/// Extract the payload text of an SSE `data:` line.
///
/// Returns `None` for blank lines, comments, `event:`/`id:`/`retry:` fields,
/// and anything else that is not a `data:` line. The payload is trimmed.
pub fn parse_data_line(line: &str) -> Option<&str> {
    line.trim().strip_prefix("data:").map(str::trim)
}
