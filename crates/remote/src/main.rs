// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! kl-remote: WebSocket relay server for the keel persistent channel.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use kl_remote::{Server, ServerConfig, ServerState};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// kl-remote: keel relay server
#[derive(Parser, Debug)]
#[command(name = "kl-remote", version)]
#[command(about = "WebSocket relay server for keel clients")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// Seconds between heartbeat pings (0 disables)
    #[arg(long, default_value = "30")]
    ping_interval_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting kl-remote server");
    info!("  Bind address: {}", args.bind);

    let config = ServerConfig {
        ping_interval: (args.ping_interval_secs > 0)
            .then(|| Duration::from_secs(args.ping_interval_secs)),
    };
    info!("  Ping interval: {:?}", config.ping_interval);

    let server = Server::bind(args.bind, ServerState::new(), config).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    server.shutdown().await;

    Ok(())
}
