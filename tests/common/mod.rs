//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use repo_guard::config::ServerConfig;
use repo_guard::security::{IpRange, ProtectedRepoFilter};
use repo_guard::server::{AppState, Server};

/// Create a filter protecting `protected-repo` with a 10.0.0.0/24 whitelist
pub fn create_test_filter() -> Arc<ProtectedRepoFilter> {
    Arc::new(
        ProtectedRepoFilter::new("protected-repo", "10.0.0.0/24")
            .expect("Failed to create test filter"),
    )
}

/// Create a test application state that trusts proxy headers from loopback
pub fn create_test_state() -> AppState {
    create_state_trusting("127.0.0.1")
}

/// Create a test application state that trusts proxy headers from `proxies`
pub fn create_state_trusting(proxies: &str) -> AppState {
    let ranges = IpRange::parse_list(proxies, "trusted_proxies").expect("Invalid proxy ranges");
    AppState::new(create_test_filter()).with_trusted_proxies(ranges)
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(state: AppState) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let server = Server::new(ServerConfig::default(), state);
    tokio::spawn(async move {
        server
            .serve(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    (addr, shutdown_tx)
}
