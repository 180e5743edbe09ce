//! cutout: a background removal web service.
//!
//! This is the application entry point. It initializes tracing, loads
//! configuration, builds the removal backend, sets up the Axum router and
//! starts the HTTP server with graceful shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cutout::config::{AppConfig, DEFAULT_LOG_FILTER};
use cutout::shutdown::shutdown_signal;
use cutout::{create_router, AppState};

/// cutout: remove image backgrounds over HTTP
#[derive(Parser, Debug)]
#[command(name = "cutout", version, about)]
struct Args {
    /// Path to configuration file (defaults to config/default.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level filter (e.g., "cutout=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration first so the log format is known
    let config = AppConfig::load_or_default(args.config.as_deref())?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!(
        max_upload_bytes = config.http.max_upload_bytes,
        cors_enabled = config.cors.enabled,
        allowed_origins = ?config.cors.allowed_origins,
        allow_credentials = config.cors.allow_credentials,
        "Loaded configuration"
    );

    let state = AppState::from_config(config.clone());
    tracing::info!(
        backend = state.remover.name(),
        max_dimension = config.remover.max_dimension,
        timeout_seconds = ?config.remover.timeout_seconds,
        "Initialized background remover"
    );

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
