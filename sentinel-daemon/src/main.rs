// sentinel-daemon/src/main.rs
// ============================================================================
// Binary: sentineld
// Description: Process entry point. Loads `sentinel.toml`, wires the
// storage backend, the ingest gateway, and the guardrail/health/retention
// background loops, then serves HTTP until asked to shut down (§6).
// Dependencies: clap, tokio, tracing, tracing-subscriber, sentinel-config,
// sentinel-ingest, sentinel-guardrails, sentinel-retention,
// sentinel-analytics
// ============================================================================

//! ## Overview
//! `sentineld` is deliberately thin: no subcommand tree, no OpenAPI
//! generation, no UI (out of scope, §4). Its only job is to resolve
//! configuration, assemble [`storage::Storage`], and spawn the ingest
//! gateway alongside the three background loops in [`tasks`].

#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "test modules favour direct assertions over production error handling"
    )
)]

mod error;
mod storage;
mod tasks;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use error::DaemonError;
use sentinel_bus::EventBus;
use sentinel_guardrails::GuardrailStore;
use sentinel_ingest::ApiKeyStore;
use sentinel_ingest::AppState;
use tracing_subscriber::EnvFilter;

/// Seconds between retention sweeps once the daemon is running (the first
/// sweep fires this long after startup, not immediately, so a restart loop
/// cannot hammer the backend).
const RETENTION_TICK_SECS: u64 = 24 * 60 * 60;

/// Seconds between health-score cache refreshes, ahead of each guardrail
/// tick (Open Question decision #4, `../DESIGN.md`).
const HEALTH_REFRESH_INTERVAL_SECS: u64 = 60;

/// `sentineld` command line. The CLI surface is intentionally minimal — no
/// OpenAPI generation, no management subcommands (§4 "Out of scope").
#[derive(Parser, Debug)]
#[command(name = "sentineld", about = "Sentinel Ledger daemon", version)]
struct Cli {
    /// Path to `sentinel.toml`. Falls back to `SENTINEL_CONFIG`, then
    /// `sentinel.toml` in the working directory (§2.3).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "fatal startup error");
            ExitCode::FAILURE
        }
    }
}

/// Installs the process-wide `tracing` subscriber, honoring `RUST_LOG` and
/// defaulting to `info` (§2.1).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Loads configuration, assembles storage and application state, spawns
/// the background loops, and serves HTTP until shutdown.
async fn run() -> Result<(), DaemonError> {
    let cli = Cli::parse();
    let config = sentinel_config::load(cli.config.as_deref())?;
    tracing::info!(bind_address = %config.server.bind_address, "configuration loaded");

    let storage = storage::build(&config.storage).await?;
    let guardrails = GuardrailStore::new(storage.control_plane.clone());
    let api_keys = ApiKeyStore::new(storage.control_plane.clone());
    let bus = Arc::new(EventBus::new());
    let health_cache = sentinel_analytics::HealthScoreCache::new();

    let guardrail_loop = tokio::spawn(tasks::run_guardrail_loop(
        storage.event_store.clone(),
        guardrails.clone(),
        bus.clone(),
        health_cache.clone(),
        Duration::from_secs(config.guardrails.tick_interval_secs),
    ));
    let health_loop = tokio::spawn(tasks::run_health_refresh_loop(
        storage.event_store.clone(),
        api_keys.clone(),
        health_cache.clone(),
        Duration::from_secs(HEALTH_REFRESH_INTERVAL_SECS),
    ));
    let retention_loop = tokio::spawn(tasks::run_retention_loop(
        storage.event_store.clone(),
        api_keys.clone(),
        config.retention.clone(),
        config.retention.lead_days,
        Duration::from_secs(RETENTION_TICK_SECS),
    ));

    let state = AppState::new(storage.event_store.clone(), bus, guardrails, api_keys);
    let router = sentinel_ingest::build_router(state);

    let listener =
        tokio::net::TcpListener::bind(&config.server.bind_address)
            .await
            .map_err(|source| DaemonError::Bind { address: config.server.bind_address.clone(), source })?;
    tracing::info!(bind_address = %config.server.bind_address, "ingest gateway listening");

    let serve_result = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await;

    guardrail_loop.abort();
    health_loop.abort();
    retention_loop.abort();

    serve_result.map_err(DaemonError::Serve)
}

/// Resolves once `Ctrl-C` is received, so `axum::serve` can shut down
/// gracefully instead of dropping in-flight connections.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(error) => tracing::error!(%error, "failed to install ctrl-c handler"),
    }
}
