//! repo-guard - Access control for protected package repositories
//!
//! This is the main entry point for the repo-guard application.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;

use repo_guard::config::Config;
use repo_guard::error::AppError;
use repo_guard::logging::init_tracing;
use repo_guard::security::ProtectedRepoFilter;
use repo_guard::server::{AppState, Server};

/// repo-guard - Access control for protected package repositories
#[derive(Parser, Debug)]
#[command(name = "repo-guard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "REPO_GUARD_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;

    init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting repo-guard");

    // A broken whitelist must stop startup
    let filter = ProtectedRepoFilter::from_config(&config.security).map_err(AppError::from)?;
    info!(
        protected_repos = ?filter.protected_repos(),
        white_listed_ip_ranges = ?filter
            .white_listed_ip_ranges()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        "Access filter configured"
    );

    let trusted_proxies = config
        .server
        .trusted_proxy_ranges()
        .map_err(AppError::from)?;
    let state = AppState::new(Arc::new(filter)).with_trusted_proxies(trusted_proxies);

    let server = Server::new(config.server.clone(), state);

    info!(
        host = %config.server.host,
        port = %config.server.port,
        trust_proxy_headers = config.server.trust_proxy_headers,
        trusted_proxies = %config.server.trusted_proxies,
        "Starting HTTP server"
    );

    server.run(shutdown_signal()).await?;

    info!("repo-guard shutdown complete");
    Ok(())
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> Result<Config, AppError> {
    let config = match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path)?
        }
        None => {
            eprintln!("Loading configuration from environment variables");
            Config::from_env()?
        }
    };
    Ok(config)
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
