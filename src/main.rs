//! Request bin server.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                     REQUEST BIN                       │
//!                        │                                                       │
//!   Any request          │  ┌─────────┐    ┌────────────┐    ┌──────────────┐    │
//!   /api/echo/* ─────────┼─▶│  http   │───▶│  capture   │───▶│    store     │    │
//!                        │  │ server  │    │ normalize  │    │ index + map  │    │
//!                        │  └─────────┘    └─────┬──────┘    └──────▲───────┘    │
//!                        │                       │ publish          │ latest/get │
//!                        │                       ▼                  │            │
//!   Live viewers         │  ┌─────────┐    ┌────────────┐    ┌──────┴───────┐    │
//!   /api/events ◀────────┼──│   SSE   │◀───│ broadcast  │    │   history    │◀───┼── /api/requests
//!                        │  │ stream  │    │    hub     │    │   handlers   │    │
//!                        │  └─────────┘    └────────────┘    └──────────────┘    │
//!                        │                                                       │
//!                        │   config · lifecycle · observability (cross-cutting)  │
//!                        └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use request_bin::config::validation::validate_config;
use request_bin::config::{load_config, BinConfig, ConfigError};
use request_bin::lifecycle::{signals, startup, Shutdown};
use request_bin::observability::{logging, metrics};
use request_bin::HttpServer;

#[derive(Parser)]
#[command(name = "request-bin")]
#[command(about = "Capture HTTP requests and watch them arrive live", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BinConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "request-bin starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        heartbeat_secs = config.stream.heartbeat_secs,
        max_records = config.store.max_records,
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

    let store = startup::open_store(&config.store)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config.clone(), store.clone());
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        _ = signals::wait_for_signal() => {
            shutdown.trigger();
            server_task.await??;
        }
        result = &mut server_task => {
            tracing::warn!("HTTP server exited without a shutdown signal");
            result??;
        }
    }

    startup::persist_store(&store, &config.store)?;

    tracing::info!("Shutdown complete");
    Ok(())
}
