// sentinel-store-pg/src/lib.rs
// ============================================================================
// Crate: sentinel-store-pg
// Description: Partitioned, multi-process `EventStore`/`EmbeddingStore`
// backend.
// ============================================================================

//! ## Overview
//! This crate is the horizontally scalable backend for deployments that
//! have outgrown one `SQLite` file: events partitioned monthly, row-level
//! security enforcing tenant isolation beneath the `tenant_id` predicate
//! every query already carries, and vector ranking pushed into Postgres
//! itself instead of computed in process. It implements the same
//! [`sentinel_contract::EventStore`] and [`sentinel_contract::EmbeddingStore`]
//! traits that `sentinel-store-sqlite` implements, so callers above storage
//! never branch on which backend is wired in.

#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "test code favors clarity over the production error-handling discipline"
    )
)]

mod convert;
mod schema;
mod store;

pub use schema::ensure_month_partition;
pub use schema::partition_name_for;
pub use schema::partitions_older_than;
pub use schema::SCHEMA_VERSION;
pub use store::count_expiring;
pub use store::PgStore;
pub use store::PgStoreConfig;
pub use store::PgStoreError;
