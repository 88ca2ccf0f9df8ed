// sentinel-redact/src/lib.rs
// ============================================================================
// Crate: sentinel-redact
// Description: Ordered multi-layer content rewriter producing redacted,
// blocked, or pending-review artifacts (§4.5).
// ============================================================================

//! ## Overview
//! [`Pipeline`] folds six layers over caller-submitted text, in ascending
//! order: secret detection, PII detection, URL path scrubbing, tenant
//! de-identification, a semantic deny-list, and a human-review gate. The
//! first five rewrite text and accumulate [`RedactionFinding`]s; the deny
//! list can instead block the artifact outright, and the review gate can
//! hold it for a human rather than returning redacted content.
//!
//! The interesting type-system piece is [`RedactedArtifact`]: it can only be
//! constructed from inside this crate (via a private [`ConstructionToken`]),
//! so nothing upstream can fabricate "already redacted" content and skip the
//! pipeline by mistake (§9 "Branded types for redaction").

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

mod entropy;
mod layers;
mod luhn;
mod patterns;
mod pipeline;
mod types;

pub use entropy::ENTROPY_THRESHOLD;
pub use entropy::MIN_RUN_LENGTH;
pub use pipeline::Pipeline;
pub use types::ConstructionToken;
pub use types::DenyRule;
pub use types::RawArtifact;
pub use types::RedactedArtifact;
pub use types::RedactionContext;
pub use types::RedactionFinding;
pub use types::RedactionOutcome;
