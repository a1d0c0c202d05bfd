//! HTTP sidecar for repo-guard
//!
//! Exposes the access filter to a fronting proxy as an authorization
//! sub-request endpoint, next to the protected repository admin API.

pub mod middleware;
pub mod router;

pub use middleware::{RemoteHost, FORWARDED_FOR_HEADER, REMOTE_HOST_HEADER};
pub use router::{build_router, AppState, HealthResponse, ORIGINAL_URI_HEADER};

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ServerConfig;

/// Access decision sidecar
///
/// Connections are served with their peer address attached, which is where
/// [`middleware::remote_host_middleware`] takes the remote identity from.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Configured bind address; an unparsable host binds all interfaces
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.config.host.parse().unwrap_or([0, 0, 0, 0].into()),
            self.config.port,
        )
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = self.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("{}: {}", addr, e)))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(e.to_string()))?;
        let app = build_router(self.state).layer(tower_http::trace::TraceLayer::new_for_http());

        tracing::info!(addr = %local_addr, "Access decision endpoint listening");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    #[error("Server error: {0}")]
    Serve(String),
}
