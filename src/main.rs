//! Settlement signing proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │               SETTLEMENT PROXY               │
//!                        │                                              │
//!   Settlement service   │  POST /rsf                                   │
//!   ─────────────────────┼─▶ caller token ─▶ sign body ─▶ allow-list ───┼──▶ Network participant
//!                        │       │                                      │
//!                        │       ▼                                      │
//!                        │  ┌──────────┐                                │
//!                        │  │ rsf keys │  GET /public/auth/keys         │
//!                        │  └──────────┘                                │
//!                        │                                              │
//!   Network participant  │  POST /on_settle | /on_report | /on_recon    │
//!   ─────────────────────┼─▶ verify signature ─▶ credential headers ────┼──▶ Settlement service
//!                        │       │                                      │
//!                        │       ▼                                      │
//!                        │  ┌───────────────┐                           │
//!                        │  │ registry keys │  POST /lookup             │
//!                        │  └───────────────┘                           │
//!                        └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::net::TcpListener;

use settlement_proxy::config::load_config;
use settlement_proxy::lifecycle::{wait_for_signal, Shutdown};
use settlement_proxy::observability::{logging, metrics};
use settlement_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "settlement-proxy")]
#[command(about = "Signing reverse proxy for the settlement network", long_about = None)]
struct Args {
    /// TOML configuration file. Environment variables override its values.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("settlement-proxy: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "settlement-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let server = match HttpServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build proxy");
            return ExitCode::FAILURE;
        }
    };

    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_address, error = %e, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    if let Err(e) = server.run(listener, receiver).await {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
