// sentinel-core/src/ids.rs
// ============================================================================
// Module: Sentinel Identifiers
// Description: Canonical opaque identifiers for tenants, sessions, agents,
// events, and the auxiliary entities built on top of the event log.
// Purpose: Provide strongly typed, serializable identifiers with stable wire
// forms across the embedded and partitioned storage backends.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque UTF-8 strings on the wire. The embedded backend
//! stamps a constant `"default"` tenant id; the partitioned backend uses a
//! UUID string. Neither shape is privileged by these types — they carry
//! whatever the backend produces.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use rand::RngCore;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Macro: opaque string identifier
// ============================================================================

macro_rules! opaque_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the owned string.
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

opaque_id!(TenantId, "Tenant identifier; isolation domain for every row in every table.");
opaque_id!(SessionId, "Session identifier; groups events from one agent run.");
opaque_id!(AgentId, "Agent identifier; logical identity producing sessions within a tenant.");
opaque_id!(EventId, "Event identifier; unique within a tenant.");
opaque_id!(GuardrailRuleId, "Guardrail rule identifier.");
opaque_id!(TriggerHistoryId, "Guardrail trigger history record identifier.");
opaque_id!(EmbeddingId, "Embedding row identifier.");
opaque_id!(ApiKeyId, "API key identifier.");
opaque_id!(ReviewId, "Human-review queue token returned by the redaction pipeline.");

impl TenantId {
    /// The constant tenant id stamped by the embedded (single-process) backend.
    #[must_use]
    pub fn default_embedded() -> Self {
        Self::new("default")
    }
}

// ============================================================================
// SECTION: Time-ordered identifier generation
// ============================================================================

/// Number of random bytes appended after the millisecond timestamp to keep
/// identifiers generated within the same millisecond distinct and to avoid
/// leaking a purely sequential counter.
const RANDOM_SUFFIX_BYTES: usize = 10;

const CROCKFORD_BASE32: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Generates a time-ordered, lexicographically sortable identifier (a
/// ULID-shaped 26-character Crockford base32 string: 48 bits of millisecond
/// timestamp followed by 80 bits of randomness).
///
/// Used by the ingest gateway (§4.10) to stamp an id on events the client
/// submitted without one.
#[must_use]
pub fn generate_sortable_id(now_millis: u64) -> String {
    let mut random = [0_u8; RANDOM_SUFFIX_BYTES];
    rand::thread_rng().fill_bytes(&mut random);
    encode_ulid(now_millis, &random)
}

fn encode_ulid(timestamp_millis: u64, random: &[u8; RANDOM_SUFFIX_BYTES]) -> String {
    let mut bits: u128 = u128::from(timestamp_millis) << 80;
    for (index, byte) in random.iter().enumerate() {
        bits |= u128::from(*byte) << (8 * (RANDOM_SUFFIX_BYTES - 1 - index));
    }
    let mut out = String::with_capacity(26);
    for shift in (0..26).rev() {
        let index = ((bits >> (shift * 5)) & 0x1f) as usize;
        out.push(CROCKFORD_BASE32[index] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sortable_ids_increase_with_timestamp() {
        let earlier = generate_sortable_id(1_000);
        let later = generate_sortable_id(2_000);
        assert!(earlier < later);
    }

    #[test]
    fn sortable_id_is_fixed_length() {
        let id = generate_sortable_id(1_700_000_000_000);
        assert_eq!(id.len(), 26);
    }

    #[test]
    fn tenant_id_round_trips_through_json() {
        let id = TenantId::new("acme-corp");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"acme-corp\"");
        let back: TenantId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }
}
