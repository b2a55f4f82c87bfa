//! Ingest service binary.
//!
//! Boot order matters: configuration, then the database pool, then the
//! allow-list (loaded once, immutable afterwards), then the router.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ingest::web::{router, AppState};
use ingest::{AllowedEvents, Config, StatusRelay};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("ingest_service_starting");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        port = config.port,
        api_keys = config.api_keys.len(),
        slack_signing_configured = config.slack_signing_secret.is_some(),
        slack_bot_token_configured = config.slack_bot_token.is_some(),
        status_relay_configured = config.slack_log_webhook_url.is_some(),
        "config_loaded"
    );

    // Connect to storage
    let pool = ingest::store::connect(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to PostgreSQL")?;

    // Load the allow-list once; it is immutable for the process lifetime
    let allowed_events = AllowedEvents::load(&pool)
        .await
        .context("Failed to load allowed events")?;

    // Best-effort status relay
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("Failed to build HTTP client")?;
    let status_relay = StatusRelay::new(client, config.slack_log_webhook_url.clone());
    status_relay.send("ingest service starting").await;

    let port = config.port;
    let state = AppState::new(config, pool, allowed_events, status_relay);

    // Build the router
    let app = router(state).layer(TraceLayer::new_for_http());

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "ingest_service_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("ingest_service_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("ingest_service_shutting_down");
}
