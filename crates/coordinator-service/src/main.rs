//! Gatehouse State Coordinator
//!
//! Serves the action protocol over HTTP.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing
//! 3. Initialize Prometheus metrics recorder
//! 4. Initialize actor system (`CoordinatorHandle`)
//! 5. Bind the HTTP listener (fail fast) and serve
//! 6. On Ctrl+C / SIGTERM: mark not ready, stop accepting connections, drain
//!    key-space actors

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use coordinator_service::actors::{ActorMetrics, CoordinatorHandle};
use coordinator_service::clock::SystemClock;
use coordinator_service::config::Config;
use coordinator_service::observability::{init_metrics_recorder, HealthState};
use coordinator_service::routes::{self, AppState};
use coordinator_service::storage::memory_factory;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long key-space actors get to finish queued work on shutdown.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "coordinator_service=debug,coordinator=debug,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting Gatehouse State Coordinator");
    info!(
        instance_id = %config.instance_id,
        bind_address = %config.bind_address,
        default_keyspace = %config.default_keyspace,
        max_keyspaces = config.max_keyspaces,
        sweep_interval_seconds = config.sweep_interval_seconds,
        request_timeout_seconds = config.request_timeout_seconds,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to initialize metrics");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let health_state = Arc::new(HealthState::new());

    info!("Initializing actor system...");
    let coordinator = CoordinatorHandle::new(
        config.coordinator_settings(),
        memory_factory(),
        Arc::new(SystemClock),
        ActorMetrics::new(),
    );
    info!("Actor system initialized");

    let state = Arc::new(
        AppState::new(&config, coordinator.clone(), Arc::clone(&health_state)).map_err(|e| {
            error!(error = %e, "Failed to build application state");
            e
        })?,
    );
    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        format!("Invalid bind address: {e}")
    })?;

    // Bind listener BEFORE serving to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind HTTP server");
        format!("Failed to bind HTTP server to {addr}: {e}")
    })?;
    info!(addr = %addr, "HTTP server bound successfully");

    health_state.set_ready();
    info!("Coordinator running - press Ctrl+C to shutdown");

    let shutdown_health = Arc::clone(&health_state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Mark as not ready immediately so load balancers stop routing
            shutdown_health.set_not_ready();
            info!("Shutdown signal received, initiating graceful shutdown...");
        })
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            e
        })?;

    if let Err(e) = coordinator.shutdown(SHUTDOWN_DEADLINE).await {
        warn!(error = %e, "Actor system shutdown error");
    }

    info!("Coordinator shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
