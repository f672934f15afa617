//! Request Gateway (juke-rq) - Main entry point
//!
//! HTTP microservice that lets walk-up users request songs for the shared
//! venue playlist. Each submission is duplicate-checked against the audit
//! playlist, screened by the content-moderation gate, and appended to the
//! public playlist only when approved.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use juke_common::Settings;
use juke_rq::{create_router, AppState};

/// Command-line arguments for juke-rq
#[derive(Parser, Debug)]
#[command(name = "juke-rq")]
#[command(about = "Song request gateway for the shared venue playlist")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5750", env = "JUKE_RQ_PORT")]
    port: u16,

    /// Path to the TOML config file
    #[arg(short, long, env = "JUKE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "juke_rq=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    info!("Starting Juke request gateway on port {}", args.port);

    // Settings are resolved once and immutable for the process lifetime;
    // a missing credential is a startup fault, not a per-request fault.
    let settings =
        Settings::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    settings.validate().context("Incomplete configuration")?;
    info!("Configuration validated");

    let state = AppState::new(settings);
    let app = create_router(state);

    // Create socket address
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    info!("Starting HTTP server on {}", addr);

    // Create and run the server
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
