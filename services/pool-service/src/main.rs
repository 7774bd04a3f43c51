//! Randomness account pool service
//!
//! Single-binary Rust service that:
//! 1. Loads the pool from its account file (or starts empty in memory)
//! 2. Pre-provisions accounts up to the configured initial size
//! 3. Serves allocate/return requests from game servers
//! 4. Sweeps expired cooldowns in the background

mod config;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use provisioner::{CommandProvisioner, HttpProvisioner, Provisioner};
use randomness_pool::{JsonStore, PoolManager, SystemClock, spawn_cooldown_sweeper};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, ProvisionerConfig};
use crate::routes::{AppState, build_router};

/// Upper bound on waiting for in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting randomness-pool-service");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        max_size = config.pool.max_size,
        initial_size = config.pool.initial_size,
        cooldown_secs = config.pool.cooldown_secs,
        "configuration loaded"
    );

    let store = match &config.pool.store_path {
        Some(path) => JsonStore::load(path.clone())
            .await
            .with_context(|| format!("failed to load account store from {}", path.display()))?,
        None => {
            warn!("no store_path configured, accounts will not survive a restart");
            JsonStore::in_memory()
        }
    };

    let pool = Arc::new(PoolManager::new(
        Arc::new(store),
        build_provisioner(&config.provisioner),
        config.pool.settings(),
        Arc::new(SystemClock),
    ));

    // Bootstrap before binding so the first request already finds a warm pool
    let report = pool.initialize_pool(config.pool.initial_size).await;
    if report.created < report.attempted {
        warn!(
            created = report.created,
            attempted = report.attempted,
            "pool bootstrap partially failed, remaining accounts will be created on demand"
        );
    }

    let sweeper = spawn_cooldown_sweeper(pool.clone(), config.pool.sweep_interval());

    let app_state = AppState {
        pool,
        default_cooldown: config.pool.cooldown(),
        prometheus: prometheus_handle,
    };
    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts: signal the server to drain, then race the drain against it.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    sweeper.abort();
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Build the configured provisioning backend.
fn build_provisioner(config: &ProvisionerConfig) -> Arc<dyn Provisioner> {
    match config {
        ProvisionerConfig::Command {
            program,
            args,
            timeout_secs,
        } => Arc::new(CommandProvisioner::new(
            program.clone(),
            args.clone(),
            Duration::from_secs(*timeout_secs),
        )),
        ProvisionerConfig::Http {
            url,
            queue,
            api_key,
            timeout_secs,
            ..
        } => {
            if api_key.is_none() {
                warn!("http provisioner has no API key, requests will be unauthenticated");
            }
            Arc::new(HttpProvisioner::new(
                reqwest::Client::new(),
                url.clone(),
                queue.clone(),
                api_key.clone(),
                Duration::from_secs(*timeout_secs),
            ))
        }
    }
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
