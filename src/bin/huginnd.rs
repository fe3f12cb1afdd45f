//! huginnd: Huginn daemon.
//!
//! Serves the [`ImageGateway`](huginn::ImageGateway) over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use huginn::server::config::{Config, Secrets};
use huginn::server::{AppState, build_gateway, create_router};

/// Huginn daemon: caching image-generation proxy.
#[derive(Parser)]
#[command(name = "huginnd")]
#[command(version = huginn::PKG_VERSION)]
#[command(about = "Huginn image-generation proxy daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "HUGINN_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Override the bind address from the config file.
    #[arg(long, env = "HUGINN_ADDRESS")]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: info for the daemon; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    let gateway = build_gateway(&config, &secrets).await?;

    let address = args.address.unwrap_or_else(|| config.server.address.clone());
    let addr: SocketAddr = address
        .parse()
        .map_err(|e| huginn::HuginnError::Configuration(format!("Invalid address: {e}")))?;

    let proxy_key = secrets
        .proxy_access_key()
        .ok_or_else(|| huginn::HuginnError::Configuration("missing proxy access key".into()))?;
    let state = AppState::new(gateway, proxy_key).admin_token(secrets.admin_token());
    if state.admin_token.is_none() {
        info!("no admin token configured, cache deletion disabled");
    }

    info!(version = huginn::PKG_VERSION, %addr, "huginnd starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, create_router(Arc::new(state)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("huginnd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
