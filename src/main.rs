//! tee-proxy: forward to a primary backend, mirror to shadows.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                  TEE PROXY                   │
//!   Client Request       │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!   ─────────────────────┼─▶│  axum   │──▶│ handler  │──▶│ transport │──┼──▶ Primary
//!                        │  │ server  │   │          │   │   cache   │  │
//!   Client Response      │  └─────────┘   └────┬─────┘   └───────────┘  │
//!   ◀────────────────────┼─────────────────────┘ │             ▲        │
//!                        │                       ▼ sampled     │        │
//!                        │              ┌─────────────────┐    │        │
//!                        │              │ bounded queue   │    │        │
//!                        │              │ + W workers     │────┘────────┼──▶ Shadows
//!                        │              └─────────────────┘             │    (discarded)
//!                        └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use tokio::net::TcpListener;

use tee_proxy::cli::Cli;
use tee_proxy::net::tls::load_tls_config;
use tee_proxy::observability::{logging, metrics};
use tee_proxy::{MirrorServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        listen = %config.listener.bind_address,
        primary = %config.primary.target,
        shadows = ?config.shadow.targets,
        percent = config.shadow.percent,
        "tee-proxy v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if let Some(addr) = &config.observability.metrics_address {
        metrics::init_metrics(addr.parse()?)?;
    }

    let addr = config.listener.socket_addr()?;
    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let server = MirrorServer::new(&config);
    match &config.listener.tls {
        Some(tls) => {
            let rustls = load_tls_config(tls).await?;
            server.run_tls(addr, rustls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(addr).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
