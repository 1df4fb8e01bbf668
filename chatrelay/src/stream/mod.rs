// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// SSE reframing for the streaming chat endpoint
//
// Responsibilities:
// - Split the upstream body into lines without buffering the whole body
// - Parse `data:` payloads as JSON, skipping anything that does not parse
// - Forward answer deltas to the client immediately
// - Track the latest conversation id seen on any event
// - Finish with a completion event, or an error event if upstream breaks
// - Stop reading upstream as soon as the client disconnects

mod classifier;
mod processor;
mod types;

pub use classifier::{parse_data_line, ChunkClassifier, CozeChunkClassifier};
pub use processor::{LineBuffer, ReframeState, Reframer};
pub use types::{Classified, StreamEvent, INTERRUPTED_MESSAGE, OPEN_FAILED_MESSAGE};
