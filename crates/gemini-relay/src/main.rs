// Copyright 2026 Gemini Relay Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gemini relay entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use gemini_relay::config::{ServerConfig, UpstreamConfig};
use gemini_relay::relay::Relay;
use gemini_relay::rest::{self, AppState};

#[derive(Parser)]
#[command(
    name = "gemini-relay",
    about = "Relay prompts to the Gemini web app through a freshly scraped session",
    version
)]
struct Cli {
    /// Listen host. Also reads RELAY_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Listen port. Also reads RELAY_PORT.
    #[arg(long, short)]
    port: Option<u16>,

    /// Debug mode: log at debug level unless RUST_LOG says otherwise.
    #[arg(long)]
    debug: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let server = ServerConfig::resolve(cli.host.as_deref(), cli.port, cli.debug)
        .context("failed to resolve server configuration")?;

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or_else(|| server.default_log_level());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::info!("starting gemini-relay v{}", env!("CARGO_PKG_VERSION"));
    if server.debug {
        tracing::info!("debug mode on");
    }

    let relay = Relay::new(UpstreamConfig::default());
    tracing::info!("upstream page: {}", relay.config().page_url);

    let state = Arc::new(AppState::new(relay));
    rest::serve(&server, state)
        .await
        .with_context(|| format!("failed to serve on {}", server.bind_address()))
}
