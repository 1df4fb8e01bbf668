// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Default values applied when a setting is absent from every source.

/// Chat endpoint of the hosted bot API.
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.coze.com/v1/chat";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// Connect timeout, shared by buffered and streaming requests.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3_050;

/// Total timeout for a buffered (non-streaming) chat request.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

/// Streaming: max wait for response headers, and for each body read after that.
pub const DEFAULT_STREAM_TIMEOUT_MS: u64 = 30_000;

// Environment variable names.
pub const ENV_UPSTREAM_URL: &str = "COZE_API_URL";
pub const ENV_API_KEY: &str = "COZE_API_KEY";
pub const ENV_BOT_ID: &str = "BOT_ID";
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_DEBUG: &str = "DEBUG";
/// Read when `DEBUG` is unset, for deployments configured for the Flask app.
pub const ENV_FLASK_DEBUG: &str = "FLASK_DEBUG";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "COZE_CONNECT_TIMEOUT_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "COZE_REQUEST_TIMEOUT_MS";
pub const ENV_STREAM_TIMEOUT_MS: &str = "COZE_STREAM_TIMEOUT_MS";
