// sentinel-daemon/src/storage.rs
// ============================================================================
// Module: Storage Wiring
// Description: Resolves `StorageConfig` into a concrete event store plus
// the shared connection backing the control-plane tables (§4.2, Open
// Question decision #5 in ../../DESIGN.md).
// Dependencies: sentinel-config, sentinel-contract, sentinel-store-pg,
// sentinel-store-sqlite
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use rusqlite::Connection;
use sentinel_config::StorageConfig;
use sentinel_contract::EventStore;
use sentinel_store_pg::PgStore;
use sentinel_store_pg::PgStoreConfig;
use sentinel_store_sqlite::SqliteStore;
use sentinel_store_sqlite::SqliteStoreConfig;

use crate::error::DaemonError;

/// The assembled storage layer: the tenant-scoped event store behind the
/// storage-agnostic contract, plus the raw connection backing the
/// gateway-only control-plane tables (`api_keys`, `guardrail_rules`,
/// `guardrail_state`, `guardrail_trigger_history`).
///
/// For the embedded backend these are the same database. For the
/// partitioned backend the control-plane tables live in a dedicated local
/// `SQLite` file, since the partitioned backend has never modeled them.
pub struct Storage {
    /// Tenant-scoped event/session/agent/embedding store.
    pub event_store: Arc<dyn EventStore>,
    /// Shared connection backing the control-plane tables.
    pub control_plane: Arc<Mutex<Connection>>,
}

/// Assembles the storage layer from the resolved configuration.
///
/// # Errors
///
/// Returns [`DaemonError`] when either backend fails to connect or apply
/// its schema.
pub async fn build(config: &StorageConfig) -> Result<Storage, DaemonError> {
    match config {
        StorageConfig::Embedded { path } => {
            let sqlite = SqliteStore::open(&SqliteStoreConfig::at(path))?;
            let control_plane = sqlite.connection_handle();
            Ok(Storage { event_store: Arc::new(sqlite), control_plane })
        }
        StorageConfig::Partitioned { connection_string, control_plane_path } => {
            let pg = PgStore::connect(&PgStoreConfig::new(connection_string.clone())).await?;
            let control_plane_store = SqliteStore::open(&SqliteStoreConfig::at(control_plane_path))?;
            let control_plane = control_plane_store.connection_handle();
            Ok(Storage { event_store: Arc::new(pg), control_plane })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedded_backend_shares_one_connection_for_events_and_control_plane() {
        let config = StorageConfig::Embedded { path: ":memory:".to_string() };
        let storage = build(&config).await.expect("build embedded storage");
        // One strong ref lives inside the `SqliteStore` behind `event_store`,
        // the other is `control_plane` itself: both point at the same file.
        assert_eq!(Arc::strong_count(&storage.control_plane), 2);
        assert!(!storage.event_store.capabilities().vector_search);
    }
}
