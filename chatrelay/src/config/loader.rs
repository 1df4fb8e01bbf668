// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use super::defaults::*;
use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::raw;
use super::source::ConfigSource;
use super::types::{RelayConfig, ServerConfig, UpstreamConfig};

/// Load and validate a relay config from a YAML source, resolving `${VAR}`
/// references from the process environment.
pub fn load_config(source: &dyn ConfigSource) -> Result<RelayConfig, ConfigError> {
    load_config_with(source, |name| std::env::var(name).ok())
}

/// Load and validate a relay config from a YAML source, resolving `${VAR}`
/// references through `lookup`.
///
/// Steps:
/// 1. Read raw YAML from source
/// 2. Parse YAML into raw deserialization types
/// 3. Resolve variable interpolation in string fields
/// 4. Apply defaults for absent settings
/// 5. Validate
pub fn load_config_with<F>(source: &dyn ConfigSource, lookup: F) -> Result<RelayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw_yaml = source.load()?;
    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    let server = match raw.server {
        Some(s) => ServerConfig {
            host: match s.host {
                Some(h) => resolve_variables(&h, &lookup)?,
                None => DEFAULT_HOST.to_string(),
            },
            port: s.port.unwrap_or(DEFAULT_PORT),
            debug: s.debug.unwrap_or(false),
        },
        None => ServerConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            debug: false,
        },
    };

    let up = raw.upstream;
    let upstream = UpstreamConfig {
        url: match up.url {
            Some(u) => resolve_variables(&u, &lookup)?,
            None => DEFAULT_UPSTREAM_URL.to_string(),
        },
        api_key: resolve_variables(&up.api_key, &lookup)?,
        bot_id: resolve_variables(&up.bot_id, &lookup)?,
        connect_timeout: Duration::from_millis(
            up.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
        ),
        request_timeout: Duration::from_millis(
            up.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        ),
        stream_timeout: Duration::from_millis(
            up.stream_timeout_ms.unwrap_or(DEFAULT_STREAM_TIMEOUT_MS),
        ),
    };

    let config = RelayConfig { server, upstream };
    validate(&config)?;
    Ok(config)
}

/// Build the config from process environment variables.
pub fn config_from_env() -> Result<RelayConfig, ConfigError> {
    config_from_lookup(|name| std::env::var(name).ok())
}

/// Build the config from environment-style variables supplied by `lookup`.
///
/// `COZE_API_KEY` and `BOT_ID` are required; everything else has a default.
pub fn config_from_lookup<F>(lookup: F) -> Result<RelayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let required = |name: &str| {
        get(name).ok_or_else(|| ConfigError::MissingSetting {
            name: name.to_string(),
        })
    };

    let server = ServerConfig {
        host: get(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_setting(ENV_PORT, get(ENV_PORT), DEFAULT_PORT)?,
        debug: get(ENV_DEBUG)
            .or_else(|| get(ENV_FLASK_DEBUG))
            .map(|v| parse_flag(&v))
            .unwrap_or(false),
    };

    let upstream = UpstreamConfig {
        url: get(ENV_UPSTREAM_URL).unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
        api_key: required(ENV_API_KEY)?,
        bot_id: required(ENV_BOT_ID)?,
        connect_timeout: Duration::from_millis(parse_setting(
            ENV_CONNECT_TIMEOUT_MS,
            get(ENV_CONNECT_TIMEOUT_MS),
            DEFAULT_CONNECT_TIMEOUT_MS,
        )?),
        request_timeout: Duration::from_millis(parse_setting(
            ENV_REQUEST_TIMEOUT_MS,
            get(ENV_REQUEST_TIMEOUT_MS),
            DEFAULT_REQUEST_TIMEOUT_MS,
        )?),
        stream_timeout: Duration::from_millis(parse_setting(
            ENV_STREAM_TIMEOUT_MS,
            get(ENV_STREAM_TIMEOUT_MS),
            DEFAULT_STREAM_TIMEOUT_MS,
        )?),
    };

    let config = RelayConfig { server, upstream };
    validate(&config)?;
    Ok(config)
}

fn parse_setting<T: std::str::FromStr>(
    name: &str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: v,
        }),
        None => Ok(default),
    }
}

fn parse_flag(value: &str) -> bool {
    let v = value.trim();
    v.eq_ignore_ascii_case("true") || v == "1"
}

fn validate(config: &RelayConfig) -> Result<(), ConfigError> {
    let up = &config.upstream;

    if up.api_key.trim().is_empty() {
        return Err(ConfigError::Validation("upstream api_key must not be empty".into()));
    }
    if up.bot_id.trim().is_empty() {
        return Err(ConfigError::Validation("upstream bot_id must not be empty".into()));
    }
    if !(up.url.starts_with("http://") || up.url.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "upstream url \"{}\" must start with http:// or https://",
            up.url
        )));
    }
    for (name, timeout) in [
        ("connect_timeout", up.connect_timeout),
        ("request_timeout", up.request_timeout),
        ("stream_timeout", up.stream_timeout),
    ] {
        if timeout.is_zero() {
            return Err(ConfigError::Validation(format!("{name} must be greater than zero")));
        }
    }
    if config.server.host.trim().is_empty() {
        return Err(ConfigError::Validation("server host must not be empty".into()));
    }

    Ok(())
}
