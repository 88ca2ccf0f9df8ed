// sentinel-core/src/lib.rs
// ============================================================================
// Module: Sentinel Core Library
// Description: Public API surface for the Sentinel Ledger event model.
// Purpose: Expose the event record, hashing, identifiers, tenant scoping,
// and API key primitives shared by every other crate in the workspace.
// Dependencies: crate::{apikey, event, hashing, ids, tenant, time}
// ============================================================================

#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only assertions are permitted."
    )
)]

//! ## Overview
//! Sentinel Core is the backend-agnostic event model: the canonical
//! [`Event`] record, its closed [`EventType`] enumeration, the RFC 8785
//! hash-chain primitives, opaque identifiers, tenant scoping, and API key
//! handling. It has no storage or network dependencies — every other crate
//! in the workspace builds on top of it.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod apikey;
pub mod event;
pub mod hashing;
pub mod ids;
pub mod tenant;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use apikey::ApiKeyRecord;
pub use apikey::KeyEnvironment;
pub use apikey::MintedKey;
pub use event::Event;
pub use event::EventType;
pub use event::Severity;
pub use event::ValidationError;
pub use event::ValidationFailure;
pub use event::compute_event_hash;
pub use event::extract_metric_path;
pub use event::partition_by_session;
pub use event::validate_payload;
pub use hashing::HashError;
pub use ids::AgentId;
pub use ids::ApiKeyId;
pub use ids::EmbeddingId;
pub use ids::EventId;
pub use ids::GuardrailRuleId;
pub use ids::ReviewId;
pub use ids::SessionId;
pub use ids::TenantId;
pub use ids::TriggerHistoryId;
pub use ids::generate_sortable_id;
pub use tenant::AdminScope;
pub use tenant::TenantScope;
pub use time::Instant;
