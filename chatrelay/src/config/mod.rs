// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Relay configuration
//
// Two sources, same typed result:
// - environment variables (optionally seeded from a .env file by the binary)
// - a YAML file with ${VAR} interpolation
//
// Both paths apply the same defaults and the same validation.

mod defaults;
mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use defaults::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_STREAM_TIMEOUT_MS, DEFAULT_UPSTREAM_URL,
};
pub use error::ConfigError;
pub use interpolation::resolve_variables;
pub use loader::{config_from_env, config_from_lookup, load_config, load_config_with};
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::{RelayConfig, ServerConfig, UpstreamConfig};
