// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Stream reframer
//
// Takes the upstream SSE byte stream, splits it into lines, classifies
// `data:` payloads, and produces the client byte stream: one content frame
// per answer delta, then a completion frame carrying the accumulated text
// and the latest conversation id.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::Instrument;

use super::classifier::{parse_data_line, ChunkClassifier};
use super::types::{StreamEvent, INTERRUPTED_MESSAGE};

/// Frames buffered between the reframer task and the response body.
const CHANNEL_CAPACITY: usize = 64;

/// Re-emits an upstream chat stream as normalized SSE frames.
pub struct Reframer {
    classifier: Arc<dyn ChunkClassifier>,
    idle_timeout: Duration,
}

impl Reframer {
    /// `idle_timeout` bounds the wait for each upstream read.
    pub fn new(classifier: Arc<dyn ChunkClassifier>, idle_timeout: Duration) -> Self {
        Self {
            classifier,
            idle_timeout,
        }
    }

    /// Consume `input` and produce the client byte stream.
    ///
    /// `conversation_id` is the id the client sent; it is reported in the
    /// completion frame unless upstream supplies a newer one.
    ///
    /// The upstream stream is read on a spawned task. It stops early, dropping
    /// `input`, when the returned stream is dropped (client went away). A read
    /// error or idle timeout ends the stream with an error frame and no
    /// completion frame.
    pub fn process<S, E>(&self, input: S, conversation_id: String) -> impl Stream<Item = Bytes>
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let classifier = self.classifier.clone();
        let idle_timeout = self.idle_timeout;

        let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);

        let task = async move {
            let mut input = Box::pin(input);
            let mut lines = LineBuffer::default();
            let mut state = ReframeState::new(conversation_id);

            loop {
                let next = tokio::select! {
                    _ = tx.closed() => {
                        tracing::debug!("client disconnected, dropping upstream stream");
                        return;
                    }
                    next = time::timeout(idle_timeout, input.next()) => next,
                };

                let chunk = match next {
                    Ok(Some(Ok(chunk))) => chunk,
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        tracing::warn!(error = %e, "upstream stream failed mid-response");
                        let _ = tx
                            .send(StreamEvent::error(e.to_string(), INTERRUPTED_MESSAGE).to_frame())
                            .await;
                        return;
                    }
                    Err(_) => {
                        let error = format!(
                            "no data from upstream for {}ms",
                            idle_timeout.as_millis()
                        );
                        tracing::warn!(%error, "upstream stream stalled");
                        let _ = tx
                            .send(StreamEvent::error(error, INTERRUPTED_MESSAGE).to_frame())
                            .await;
                        return;
                    }
                };

                for line in lines.push(&chunk) {
                    if let Some(event) = state.apply_line(&line, classifier.as_ref()) {
                        if tx.send(event.to_frame()).await.is_err() {
                            return;
                        }
                    }
                }
            }

            // Upstream may end without a trailing newline.
            if let Some(line) = lines.take_remainder() {
                if let Some(event) = state.apply_line(&line, classifier.as_ref()) {
                    if tx.send(event.to_frame()).await.is_err() {
                        return;
                    }
                }
            }

            tracing::info!(
                answer_chars = state.full_content().chars().count(),
                conversation_id = %state.conversation_id(),
                "stream completed"
            );
            let _ = tx.send(state.completion().to_frame()).await;
        };

        tokio::spawn(task.instrument(tracing::Span::current()));

        ReceiverStream::new(rx)
    }
}

// ---------------------------------------------------------------------------
// Line splitting
// ---------------------------------------------------------------------------

/// Longest upstream line kept, in bytes. Longer lines are dropped whole.
const MAX_LINE_BYTES: usize = 1 << 20;

/// Splits a byte stream into lines.
///
/// Bytes are held until a `\n` arrives, so a multi-byte UTF-8 character split
/// across network chunks is decoded whole. A trailing `\r` is dropped. A line
/// longer than the limit is discarded up to and including its newline.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line: usize,
    /// Inside a line that already went over `max_line`.
    discarding: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
            discarding: false,
        }
    }

    /// Append a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let head = &rest[..pos];
            if !self.discarding && self.fits(head.len()) {
                self.pending.extend_from_slice(head);
                lines.push(decode_line(&self.pending));
            } else if !self.discarding {
                self.overflow();
            }
            self.pending.clear();
            self.discarding = false;
            rest = &rest[pos + 1..];
        }

        if !self.discarding {
            if self.fits(rest.len()) {
                self.pending.extend_from_slice(rest);
            } else {
                self.overflow();
                self.discarding = true;
            }
        }
        lines
    }

    /// The unterminated tail, if any. Leaves the buffer empty.
    pub fn take_remainder(&mut self) -> Option<String> {
        self.discarding = false;
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }

    fn fits(&self, extra: usize) -> bool {
        self.pending.len() + extra <= self.max_line
    }

    fn overflow(&mut self) {
        tracing::warn!(limit = self.max_line, "dropping oversized upstream line");
        self.pending.clear();
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

// ---------------------------------------------------------------------------
// Accumulation state
// ---------------------------------------------------------------------------

/// Per-stream state: the accumulated answer and the latest conversation id.
#[derive(Debug, Clone)]
pub struct ReframeState {
    full_content: String,
    conversation_id: String,
}

impl ReframeState {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            full_content: String::new(),
            conversation_id: conversation_id.into(),
        }
    }

    /// Apply one upstream line. Returns the content event to emit, if any.
    ///
    /// Non-`data:` lines, payloads that are not JSON, and JSON that is not an
    /// object are skipped without touching the state.
    pub fn apply_line(&mut self, line: &str, classifier: &dyn ChunkClassifier) -> Option<StreamEvent> {
        let payload = parse_data_line(line)?;
        let json: serde_json::Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::trace!(error = %e, "skipping non-JSON data line");
                return None;
            }
        };
        if !json.is_object() {
            return None;
        }

        let classified = classifier.classify(&json);
        if let Some(id) = classified.conversation_id {
            self.conversation_id = id;
        }

        let delta = classified.answer_delta?;
        self.full_content.push_str(&delta);
        Some(StreamEvent::content(delta))
    }

    pub fn full_content(&self) -> &str {
        &self.full_content
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// The final event for a stream that ended normally.
    pub fn completion(&self) -> StreamEvent {
        StreamEvent::done(self.full_content.clone(), self.conversation_id.clone())
    }
}
