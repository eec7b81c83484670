//! Disraptor gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                    GATEWAY                       │
//!                        │                                                  │
//!   Operator             │  ┌────────────┐   ┌────────────┐   ┌──────────┐  │
//!   ─────────────────────┼─▶│ admin API  │──▶│ RouteAdmin │──▶│RouteStore│  │
//!   /admin/routes        │  └────────────┘   └─────┬──────┘   └────┬─────┘  │
//!                        │                         │ version        │       │
//!                        │                         ▼                │       │
//!   Client Request       │  ┌────────────┐   ┌────────────┐        │       │
//!   ─────────────────────┼─▶│   http     │──▶│ LiveRoutes │        │       │
//!                        │  │  server    │   └─────┬──────┘        │       │
//!                        │  └────────────┘         ▼               ▼       │
//!                        │                   ┌──────────────────────────┐  │
//!   Client Response      │                   │     ProxyDispatcher      │──┼──▶ Upstream
//!   ◀────────────────────┼───────────────────│ RouteTable + transport   │◀─┼─── Target
//!                        │                   └──────────────────────────┘  │
//!                        │                                                  │
//!                        │  config (hot reload) · observability · lifecycle │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use disraptor::config::{load_config, watcher::ConfigWatcher, ProxyConfig};
use disraptor::lifecycle::{shutdown_signal, Shutdown};
use disraptor::observability::{logging, metrics};
use disraptor::HttpServer;

#[derive(Parser)]
#[command(name = "disraptor")]
#[command(about = "Configurable reverse-proxy gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init(&config.observability)?;

    tracing::info!("disraptor v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        enabled = config.disraptor.enabled,
        reserved_prefix = %config.disraptor.reserved_prefix,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );
    if config.disraptor.app_secret_key.is_empty() {
        tracing::warn!("App secret key is empty, every proxied request will be refused");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), Some(updates))
        }
        None => (None, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on(shutdown_signal());

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
