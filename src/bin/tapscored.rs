//! tapscore relay daemon
//!
//! Accepts WebSocket connections from tap-to-score clients, relays their
//! claim and give actions to each other, and broadcasts the best recent
//! score once a second.
//!
//! # Usage
//!
//! ```bash
//! # Listen on 0.0.0.0:8080
//! tapscored
//!
//! # Custom port, per-message debug logs
//! PORT=9000 DEBUG=1 tapscored
//!
//! # Full control over log filtering
//! RUST_LOG=tapscored=trace tapscored
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tapscored::broadcaster::spawn_best_broadcaster;
use tapscored::config::RelayConfig;
use tapscored::registry::spawn_registry;
use tapscored::server::RelayServer;

/// tapscore relay - real-time score sharing over WebSocket
///
/// Configured through the environment: PORT (default 8080), BIND_ADDRESS
/// (default 0.0.0.0), DEBUG (per-message logs), RUST_LOG.
#[derive(Parser, Debug)]
#[command(name = "tapscored", version, about)]
struct Args {}

#[tokio::main]
async fn main() -> Result<()> {
    let _args = Args::parse();

    let config = RelayConfig::from_env();

    init_logging(config.as_ref().map(|c| c.debug).unwrap_or(false))?;

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e).context("invalid configuration");
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        debug = config.debug,
        "tapscore relay starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry();

    let addr = config.listen_addr();
    let server = match RelayServer::bind(addr, registry.clone(), cancel_token.clone()).await {
        Ok(server) => server,
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to start server");
            return Err(e.into());
        }
    };

    info!(addr = %server.local_addr(), "Server started");

    let broadcaster = spawn_best_broadcaster(registry, config.broadcast, cancel_token.clone());

    server.run().await;

    cancel_token.cancel();
    if let Err(e) = broadcaster.await {
        error!(error = %e, "Best broadcaster task failed");
    }

    info!("tapscore relay stopped");
    Ok(())
}

/// Installs the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the relay logs at info, or debug for
/// its own crate when `DEBUG` is on.
fn init_logging(debug: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let relay_level = if debug { "debug" } else { "info" };
            EnvFilter::new("info")
                .add_directive(format!("tapscored={relay_level}").parse()?)
                .add_directive("tapscore_core=info".parse()?)
                .add_directive("tapscore_protocol=info".parse()?)
        }
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
