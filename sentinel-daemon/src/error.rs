// sentinel-daemon/src/error.rs
// ============================================================================
// Module: Daemon Errors
// Description: Top-level failure taxonomy for process startup. Every
// variant here is fatal: the process logs it and exits 1 (§6 "Exit codes").
// Dependencies: thiserror
// ============================================================================

use thiserror::Error;

/// Everything that can go wrong bringing the process up. All variants are
/// fatal for `main`.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// `sentinel.toml` failed to load or validate.
    #[error("configuration error: {0}")]
    Config(#[from] sentinel_config::ConfigError),
    /// The embedded `SQLite` backend could not be opened or schema-applied.
    #[error("sqlite store error: {0}")]
    Sqlite(#[from] sentinel_store_sqlite::SqliteStoreError),
    /// The partitioned Postgres backend could not be connected or
    /// schema-applied.
    #[error("postgres store error: {0}")]
    Postgres(#[from] sentinel_store_pg::PgStoreError),
    /// The bind address could not be parsed or bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// The address the daemon attempted to bind.
        address: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The HTTP server itself failed while serving.
    #[error("server error: {0}")]
    Serve(std::io::Error),
}
