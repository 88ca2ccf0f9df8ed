// sentinel-store-sqlite/src/lib.rs
// ============================================================================
// Crate: sentinel-store-sqlite
// Description: Embedded, single-process `EventStore`/`EmbeddingStore`
// backend.
// ============================================================================

//! ## Overview
//! This crate is the embedded backend for a single-tenant or small-multi-tenant
//! deployment: one `SQLite` file, one shared connection behind a mutex, no
//! external services. It implements the same [`sentinel_contract::EventStore`]
//! and [`sentinel_contract::EmbeddingStore`] traits that `sentinel-store-pg`
//! implements against partitioned Postgres, so callers above storage never
//! branch on which backend is wired in.
//!
//! [`store::SqliteStore`] also owns the raw `SQLite` connection consumed
//! directly (outside the `sentinel-contract` traits) by `sentinel-guardrails`
//! for the `guardrail_rules`/`guardrail_state`/`guardrail_trigger_history`
//! tables, since those are not part of the storage-agnostic contract.

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

pub use schema::SCHEMA_VERSION;
pub use store::count_expiring;
pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
