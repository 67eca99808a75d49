//! Standalone session server daemon.
//!
//! Serves the session RPC protocol from a file-backed store, with
//! background expiration sweeping. Configure via environment:
//!
//! - `SESSION_BIND_ADDR`  - listen address (default `127.0.0.1:7878`)
//! - `SESSION_DIR`        - record directory (default `./sessions`)
//! - `SESSION_TIMEOUT_SECS` - sweep reference timeout (default `1800`)
//!
//! Run with: cargo run -p session-server-demo

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use sessiond_core::SessionBackend;
use sessiond_local::{ExpirationSweeper, LocalFileBackend};
use sessiond_remote::SessionRpcServer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let bind_addr: std::net::SocketAddr = std::env::var("SESSION_BIND_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:7878".to_string())
        .parse()
        .context("SESSION_BIND_ADDR is not a socket address")?;
    let dir = std::env::var("SESSION_DIR").unwrap_or_else(|_| "sessions".to_string());
    let timeout_secs: u64 = std::env::var("SESSION_TIMEOUT_SECS")
        .unwrap_or_else(|_| "1800".to_string())
        .parse()
        .context("SESSION_TIMEOUT_SECS is not a number")?;

    let store = Arc::new(LocalFileBackend::open(&dir).context("could not open session directory")?);
    tracing::info!(%dir, "session store opened");

    let sweep_interval = Duration::from_secs((timeout_secs / 2).max(1));
    let sweeper = ExpirationSweeper::start(Arc::clone(&store), sweep_interval);

    let server = SessionRpcServer::bind(bind_addr, store as Arc<dyn SessionBackend>)
        .await
        .context("could not bind session server")?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.shutdown();
    sweeper.shutdown();

    Ok(())
}
