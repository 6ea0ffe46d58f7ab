//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router sending every path and method to the proxy handler
//! - Start the shadow worker pool through [`AppState`]
//! - Answer `Connection: close` when keep-alive is disabled
//! - Serve plain TCP or TLS until the shutdown signal fires

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::handler::{proxy_handler, AppState};
use crate::lifecycle::shutdown;

/// How long TLS connections get to finish after shutdown is signalled.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP server for the mirroring proxy.
pub struct MirrorServer {
    router: Router,
    state: AppState,
}

impl MirrorServer {
    /// Create a new server. Starts the shadow workers, so it must run
    /// inside a Tokio runtime.
    pub fn new(config: &ProxyConfig) -> Self {
        let state = AppState::new(config);
        let router = Self::build_router(config, state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        if config.close_connections {
            router.layer(SetResponseHeaderLayer::overriding(
                header::CONNECTION,
                HeaderValue::from_static("close"),
            ))
        } else {
            router
        }
    }

    /// Serve plain HTTP on `listener` until `stop` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        stop: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            primary = %self.state.settings.primary,
            shadows = self.state.settings.shadows.len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(stop))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `stop` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        stop: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(
            address = %addr,
            primary = %self.state.settings.primary,
            shadows = self.state.settings.shadows.len(),
            "HTTPS server starting"
        );

        let handle = axum_server::Handle::new();
        let stopper = handle.clone();
        tokio::spawn(async move {
            shutdown::wait(stop).await;
            stopper.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}
