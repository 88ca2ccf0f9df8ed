// sentinel-redact/src/types.rs
// ============================================================================
// Module: Redaction Types
// Description: The raw/redacted artifact brand, findings, policy, and
// pipeline outcome shapes (§4.5, §9 "Branded types for redaction").
// Purpose: Make it a type error to persist un-redacted content: a
// `RedactedArtifact` can only be produced by `crate::pipeline`.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Raw artifact
// ============================================================================

/// Caller-supplied content that has not yet passed through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtifact {
    /// The unredacted text.
    pub content: String,
}

impl RawArtifact {
    /// Wraps raw text for submission to the pipeline.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }
}

// ============================================================================
// SECTION: Construction token
// ============================================================================

/// Capability token only [`crate::pipeline`] can construct. Its existence
/// as a required constructor argument is what makes
/// [`RedactedArtifact::new`] uncallable from outside this crate (§9
/// "Branded types for redaction").
#[derive(Debug, Clone, Copy)]
pub struct ConstructionToken(());

impl ConstructionToken {
    pub(crate) const fn issue() -> Self {
        Self(())
    }
}

// ============================================================================
// SECTION: Redacted artifact
// ============================================================================

/// Content that has passed through every pipeline layer without being
/// blocked or queued for review. The only way to obtain one is
/// [`crate::Pipeline::run`] succeeding with a redacted outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactedArtifact {
    content: String,
}

impl RedactedArtifact {
    /// Constructs a redacted artifact. Requires a [`ConstructionToken`],
    /// which only the pipeline can issue.
    #[must_use]
    pub fn new(content: String, _token: ConstructionToken) -> Self {
        Self { content }
    }

    /// Returns the redacted text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.content
    }

    /// Consumes the artifact, returning the owned redacted text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.content
    }
}

// ============================================================================
// SECTION: Findings
// ============================================================================

/// A single match produced by one pipeline layer (§3 "Redaction finding").
/// Never persisted inside the event store; returned to the caller only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionFinding {
    /// Name of the layer that produced this finding.
    pub layer: &'static str,
    /// Category of the match (e.g. `"aws_access_key"`, `"email"`).
    pub category: String,
    /// Length, in bytes, of the original matched span.
    pub original_length: usize,
    /// Token the match was replaced with.
    pub replacement_token: String,
    /// Start offset of the match within the input to its layer.
    pub start: usize,
    /// End offset (exclusive) of the match within the input to its layer.
    pub end: usize,
    /// Confidence in [0, 1] that the match is a true positive.
    pub confidence: f32,
}

// ============================================================================
// SECTION: Context and policy
// ============================================================================

/// Per-tenant policy and identifiers the pipeline needs while processing
/// an artifact (§4.5 layers 300-600).
#[derive(Debug, Clone, Default)]
pub struct RedactionContext {
    /// Tenant identifier to de-identify (layer 400).
    pub tenant_id: String,
    /// Agent identifier to de-identify (layer 400).
    pub agent_id: String,
    /// Additional tenant-specific terms to de-identify (layer 400).
    pub tenant_terms: Vec<String>,
    /// Hostnames allowed to keep their path/query (layer 300).
    pub url_host_allowlist: Vec<String>,
    /// Per-tenant semantic deny-list terms; a substring or regex match
    /// blocks the artifact (layer 500).
    pub deny_list: Vec<DenyRule>,
    /// Require human review even when no layer flagged a low-confidence
    /// finding (layer 600).
    pub require_review: bool,
    /// Confidence below which a finding triggers the review gate.
    pub review_confidence_threshold: f32,
}

/// A single semantic deny-list rule (§4.5 layer 500).
#[derive(Debug, Clone)]
pub enum DenyRule {
    /// Blocks on a case-insensitive substring match.
    Substring(String),
    /// Blocks when the compiled pattern matches.
    Pattern(String),
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// The terminal result of running the pipeline over an artifact (§4.5).
#[derive(Debug, Clone, PartialEq)]
pub enum RedactionOutcome {
    /// Every layer ran without blocking or queuing for review.
    Redacted {
        /// The fully redacted text.
        artifact: RedactedArtifact,
        /// Every finding accumulated across layers.
        findings: Vec<RedactionFinding>,
    },
    /// A layer's deny-list matched; the artifact must not be used.
    Blocked {
        /// Human-readable reason the artifact was blocked.
        reason: String,
        /// Name of the layer that blocked it.
        layer: &'static str,
    },
    /// A layer requires human sign-off before the artifact may be shared.
    PendingReview {
        /// Token identifying the queued review request.
        review_id: sentinel_core::ReviewId,
    },
}
