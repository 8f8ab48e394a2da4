//! OrgCache worker: keeps the organization cache coherent with CDC events.
//!
//! Main entry point that wires the crates together and runs until SIGINT or
//! SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use orgcache_cache::{DistributedCacheProvider, UnifiedCacheManager};
use orgcache_core::config::AppConfig;
use orgcache_core::error::AppError;
use orgcache_worker::jobs::{AuditJobHandler, HealthJobHandler};
use orgcache_worker::{CdcSubscriber, HttpOrganizationQuery, JobExecutor, WorkerRunner};

#[tokio::main]
async fn main() {
    let env = std::env::var("ORGCACHE_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "OrgCache worker failed");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting OrgCache worker");

    // ── Step 1: Distributed cache (fatal when unreachable) ───────
    tracing::info!(provider = %config.l2.provider, "Connecting distributed cache...");
    let l2 = DistributedCacheProvider::new(&config.l2)
        .await
        .map_err(|e| e.context("Distributed cache init failed"))?;
    tracing::info!(backend = l2.backend(), "Distributed cache connected");

    // ── Step 2: Authoritative query service ──────────────────────
    let upstream = HttpOrganizationQuery::new(&config.upstream)?;
    tracing::info!(base_url = %config.upstream.base_url, "Query service adapter ready");

    // ── Step 3: Cache manager ────────────────────────────────────
    let manager = UnifiedCacheManager::new(config.cache.clone(), Arc::new(l2), Arc::new(upstream))?;

    // ── Step 4: Background work ──────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let cdc_handle = if config.cdc.enabled {
        let subscriber = CdcSubscriber::new(config.cdc.clone(), manager.clone());
        let cancel = shutdown_rx.clone();
        Some(tokio::spawn(async move { subscriber.run(cancel).await }))
    } else {
        tracing::info!("CDC subscriber disabled");
        None
    };

    let mut executor = JobExecutor::new();
    executor.register(Arc::new(HealthJobHandler::new(
        manager.clone(),
        config.worker.health_interval_seconds,
    )));
    executor.register(Arc::new(AuditJobHandler::new(
        manager.clone(),
        config.worker.audit_interval_seconds,
        config.worker.audit_sample_size,
    )));

    let grace = Duration::from_secs(config.worker.shutdown_grace_seconds);
    let runner = WorkerRunner::new(Arc::new(executor), "orgcache-worker").with_grace(grace);
    let worker_cancel = shutdown_rx.clone();
    let worker_handle = tokio::spawn(async move { runner.run(worker_cancel).await });

    // ── Step 5: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    tracing::info!("Waiting for background tasks to complete...");
    if let Some(handle) = cdc_handle
        && tokio::time::timeout(grace, handle).await.is_err()
    {
        tracing::warn!("CDC subscriber did not stop within the grace period");
    }
    if tokio::time::timeout(grace, worker_handle).await.is_err() {
        tracing::warn!("Worker runner did not stop within the grace period");
    }

    manager.close().await;
    tracing::info!("OrgCache worker shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
