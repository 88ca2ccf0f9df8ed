// sentinel-contract/src/lib.rs
// ============================================================================
// Crate: sentinel-contract
// Description: The storage-agnostic contract (§4.2) shared by every backend
// and every caller above storage.
// ============================================================================

//! ## Overview
//! This crate carries no persistence logic of its own. It defines the
//! shapes (`Session`, `AgentRecord`, `Embedding`, filters, pagination) and
//! the two trait interfaces (`EventStore`, `EmbeddingStore`) that
//! `sentinel-store-sqlite` and `sentinel-store-pg` implement, plus the
//! `SentinelError` taxonomy (§7) every crate above storage propagates.

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

mod agent;
mod capabilities;
mod embedding;
mod error;
mod filter;
mod retention;
mod session;
mod stats;
mod store;

pub use agent::AgentRecord;
pub use capabilities::StorageCapabilities;
pub use embedding::cosine_similarity;
pub use embedding::decode_vector;
pub use embedding::encode_vector;
pub use embedding::Embedding;
pub use embedding::SimilarityFilter;
pub use embedding::SimilarityMatch;
pub use embedding::SourceType;
pub use error::SentinelError;
pub use filter::EventFilter;
pub use filter::EventPage;
pub use filter::Order;
pub use filter::SessionFilter;
pub use filter::SessionStatus;
pub use filter::DEFAULT_PAGE_SIZE;
pub use filter::MAX_PAGE_SIZE;
pub use retention::ExpiryWarning;
pub use retention::RetentionOutcome;
pub use session::Session;
pub use session::TokenTotals;
pub use stats::StoreStats;
pub use store::EmbeddingStore;
pub use store::EventStore;
