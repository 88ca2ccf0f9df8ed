// sentinel-core/src/time.rs
// ============================================================================
// Module: Sentinel Time Model
// Description: Canonical ISO-8601 instant used across events, sessions, and
// guardrail records.
// Purpose: Provide a single, serde-stable timestamp representation and a
// small clock abstraction so callers can inject time in tests.
// Dependencies: chrono, serde
// ============================================================================

//! ## Overview
//! Every persisted record carries an [`Instant`], serialized as an RFC 3339 /
//! ISO-8601 string with millisecond precision in UTC. The event hash (§4.1)
//! is computed over this same serialized form, so `Instant`'s `Serialize`
//! impl is the canonical wire representation and must never change shape.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Error as DeError;

// ============================================================================
// SECTION: Instant
// ============================================================================

/// A UTC instant with millisecond precision, serialized as RFC 3339.
///
/// # Invariants
/// - Round-trips byte-for-byte through `Serialize`/`Deserialize`: the same
///   instant always renders to the same string (fixed millisecond
///   precision, `Z` suffix), which is required for the hash contract (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Instant(DateTime<Utc>);

impl Instant {
    /// Returns the current wall-clock instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wraps an existing `chrono` UTC timestamp.
    #[must_use]
    pub const fn from_utc(value: DateTime<Utc>) -> Self {
        Self(value)
    }

    /// Returns the underlying `chrono` UTC timestamp.
    #[must_use]
    pub const fn as_utc(&self) -> DateTime<Utc> {
        self.0
    }

    /// Parses an RFC 3339 / ISO-8601 string.
    ///
    /// # Errors
    ///
    /// Returns an error when `value` is not a valid RFC 3339 timestamp.
    pub fn parse(value: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(value).map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Returns the canonical wire string for this instant.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Returns the number of whole seconds between `self` and `other`.
    #[must_use]
    pub fn duration_since(&self, other: &Self) -> chrono::Duration {
        self.0 - other.0
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for Instant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Instant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(DeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let instant = Instant::now();
        let json = serde_json::to_string(&instant).expect("serialize");
        let back: Instant = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(instant.to_rfc3339(), back.to_rfc3339());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Instant::parse("not-a-timestamp").is_err());
    }

    #[test]
    fn ordering_matches_wall_clock() {
        let first = Instant::parse("2026-01-01T00:00:00.000Z").expect("parse");
        let second = Instant::parse("2026-01-01T00:00:01.000Z").expect("parse");
        assert!(first < second);
    }
}
