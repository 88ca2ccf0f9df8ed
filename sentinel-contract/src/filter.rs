// sentinel-contract/src/filter.rs
// ============================================================================
// Module: Sentinel Query Filters
// Description: Filter and pagination types for `queryEvents`, `getSessions`,
// and `getAgents` (§4.2, §6).
// Purpose: Give every storage backend the same filter shape so query
// semantics do not drift between the embedded and partitioned backends.
// Dependencies: sentinel-core, serde
// ============================================================================

//! ## Overview
//! Filters are plain data; backends translate them into `WHERE` clauses.
//! `limit`/`offset` pagination is used throughout rather than cursors,
//! matching §6's query-string contract.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sentinel_core::AgentId;
use sentinel_core::EventType;
use sentinel_core::Instant;
use sentinel_core::SessionId;
use sentinel_core::Severity;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Order
// ============================================================================

/// Sort order for paginated queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Ascending by timestamp.
    #[default]
    Asc,
    /// Descending by timestamp.
    Desc,
}

// ============================================================================
// SECTION: Event Filter
// ============================================================================

/// Filter for `queryEvents` (§4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Restrict to a single event type.
    pub event_type: Option<EventType>,
    /// Restrict to a single session.
    pub session_id: Option<SessionId>,
    /// Restrict to a single agent.
    pub agent_id: Option<AgentId>,
    /// Restrict to a minimum severity (inclusive).
    pub severity: Option<Severity>,
    /// Lower timestamp bound (inclusive).
    pub from: Option<Instant>,
    /// Upper timestamp bound (exclusive).
    pub to: Option<Instant>,
    /// Sort order.
    #[serde(default)]
    pub order: Order,
    /// Maximum rows to return.
    pub limit: Option<u32>,
    /// Rows to skip before collecting `limit`.
    pub offset: Option<u32>,
}

/// Default page size applied when a filter's `limit` is unset.
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Hard upper bound on a single page, independent of what a caller asks for.
pub const MAX_PAGE_SIZE: u32 = 5_000;

impl EventFilter {
    /// Returns the effective limit, clamped to [`MAX_PAGE_SIZE`].
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
    }

    /// Returns the effective offset, defaulting to zero.
    #[must_use]
    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

/// Page of events returned by `queryEvents` (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPage {
    /// Events in this page, already ordered and sliced.
    pub events: Vec<sentinel_core::Event>,
    /// Total rows matching the filter, ignoring pagination.
    pub total: u64,
    /// True when `offset + events.len() < total`.
    pub has_more: bool,
}

// ============================================================================
// SECTION: Session Filter
// ============================================================================

/// Session lifecycle status (§3 "Session").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session has not yet ended.
    Active,
    /// Session ended without an error reason.
    Completed,
    /// Session ended with an error reason.
    Error,
}

/// Filter for `getSessions` (§4.2, §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFilter {
    /// Restrict to a single agent.
    pub agent_id: Option<AgentId>,
    /// Restrict to a lifecycle status.
    pub status: Option<SessionStatus>,
    /// Restrict to sessions carrying all of the given tags.
    pub tags: Vec<String>,
    /// Lower `started_at` bound (inclusive).
    pub from: Option<Instant>,
    /// Upper `started_at` bound (exclusive).
    pub to: Option<Instant>,
    /// Maximum rows to return.
    pub limit: Option<u32>,
    /// Rows to skip before collecting `limit`.
    pub offset: Option<u32>,
    /// When true, the backend may skip row materialization and return only
    /// a count (§6 `countOnly=true`).
    #[serde(default)]
    pub count_only: bool,
}

impl SessionFilter {
    /// Returns the effective limit, clamped to [`MAX_PAGE_SIZE`].
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_limit_clamps_to_max_page_size() {
        let filter = EventFilter { limit: Some(1_000_000), ..Default::default() };
        assert_eq!(filter.effective_limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn effective_limit_defaults_when_unset() {
        let filter = EventFilter::default();
        assert_eq!(filter.effective_limit(), DEFAULT_PAGE_SIZE);
    }
}
