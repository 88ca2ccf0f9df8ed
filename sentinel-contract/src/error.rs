// sentinel-contract/src/error.rs
// ============================================================================
// Module: Sentinel Error Taxonomy
// Description: The error kinds shared across storage, ingestion, and
// guardrail dispatch (§7).
// Purpose: Give every layer the same vocabulary for "what went wrong" so the
// ingest gateway's HTTP mapping and the client SDK's retry policy can both
// be driven off one enum.
// Dependencies: sentinel-core, thiserror
// ============================================================================

//! ## Overview
//! [`SentinelError`] is the taxonomy from §7. Lower layers (the storage
//! backends) produce the `HashChain`, `Validation`, and `Conflict` variants
//! directly; everything above them (ingest gateway, guardrail dispatch)
//! either passes those through or adds `Authentication`/`Authorization`/
//! `RateLimit`/`QuotaExceeded`/`Unavailable`. `Internal` is reserved for
//! programmer errors and is deliberately not constructed by any storage or
//! validation path in this workspace.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sentinel_core::ValidationError;
use thiserror::Error;

// ============================================================================
// SECTION: Error Taxonomy
// ============================================================================

/// The error taxonomy of §7, with an HTTP status mapping and a retry
/// policy attached.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// Input failed schema or semantic constraint.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// A batch insert violated the hash-chain invariant (§3, §4.3).
    #[error("hash chain violation: {0}")]
    HashChain(String),
    /// Missing, invalid, or revoked credential.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Credential lacks the required scope.
    #[error("authorization denied: {0}")]
    Authorization(String),
    /// Row absent, or present but owned by a different tenant.
    #[error("not found: {0}")]
    NotFound(String),
    /// Duplicate non-idempotent resource, or a hash-chain conflict that is
    /// not itself a [`SentinelError::HashChain`] (e.g. an event id already
    /// present with different fields).
    #[error("conflict: {0}")]
    Conflict(String),
    /// Ingress throttled; retry after the given number of seconds.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds the caller should wait before retrying.
        retry_after_secs: u64,
    },
    /// Billing or tier limit hit.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    /// Transient backend failure; safe to retry.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// Programmer error; never expected in normal operation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SentinelError {
    /// Maps this error to the HTTP status code specified in §7.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Authentication(_) => 401,
            Self::Authorization(_) => 403,
            Self::NotFound(_) => 404,
            Self::HashChain(_) | Self::Conflict(_) => 409,
            Self::RateLimit { .. } => 429,
            Self::QuotaExceeded(_) => 402,
            Self::Unavailable(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    /// True for the error kinds the client SDK's retry policy is allowed
    /// to retry (§7: `RateLimit`, `Unavailable`, connection errors). This
    /// workspace models "connection errors" as [`SentinelError::Unavailable`].
    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(self, Self::RateLimit { .. } | Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_chain_maps_to_409() {
        let err = SentinelError::HashChain("broken".to_string());
        assert_eq!(err.http_status(), 409);
        assert!(!err.retryable());
    }

    #[test]
    fn rate_limit_is_retryable() {
        let err = SentinelError::RateLimit { retry_after_secs: 5 };
        assert!(err.retryable());
        assert_eq!(err.http_status(), 429);
    }

    #[test]
    fn quota_exceeded_is_not_retryable() {
        let err = SentinelError::QuotaExceeded("monthly events".to_string());
        assert!(!err.retryable());
        assert_eq!(err.http_status(), 402);
    }
}
