// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use chatrelay::config;
use chatrelay::relay;
use chatrelay::upstream;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "chatrelay", about = "Chat relay with SSE reframing")]
struct Cli {
    /// YAML config file; settings come from the environment when omitted
    #[arg(long, env = "CHATRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the configured one
    #[arg(long)]
    port: Option<u16>,
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => config::load_config(&config::FileSource { path: path.clone() }),
        None => config::config_from_env(),
    };
    init_tracing(loaded.as_ref().map(|c| c.server.debug).unwrap_or(false));

    let mut config = match loaded {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let addr = config.server.bind_addr();
    tracing::info!(
        %addr,
        upstream = %config.upstream.url,
        debug = config.server.debug,
        "chatrelay starting"
    );

    let client = match upstream::build_coze_client(&config.upstream) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to build http client: {e}");
            std::process::exit(1);
        }
    };

    let state = relay::AppState::new(
        Arc::new(client),
        config.upstream.bot_id.clone(),
        config.upstream.stream_timeout,
    );
    let app = relay::build_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, "failed to bind: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "chatrelay listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
