// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::time::Duration;

/// Top-level parsed and validated relay config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
}

/// Where the relay listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Raises the default log level to `debug`.
    pub debug: bool,
}

impl ServerConfig {
    /// `host:port`, suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The hosted chat API the relay forwards to.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Full URL of the chat endpoint (POST target).
    pub url: String,
    /// Bearer token. Never logged.
    pub api_key: String,
    pub bot_id: String,
    pub connect_timeout: Duration,
    /// Total timeout for buffered requests.
    pub request_timeout: Duration,
    /// Header timeout and per-read idle timeout for streaming requests.
    pub stream_timeout: Duration,
}

// Hand-written so the API key cannot leak through `{:?}` in logs.
impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("bot_id", &self.bot_id)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("stream_timeout", &self.stream_timeout)
            .finish()
    }
}
