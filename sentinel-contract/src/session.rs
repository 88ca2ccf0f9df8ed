// sentinel-contract/src/session.rs
// ============================================================================
// Module: Sentinel Session Projection
// Description: The session entity derived from events sharing a session id
// (§3 "Session").
// Purpose: Give the event store a concrete row shape to upsert during
// ingestion (§4.3) and give analytics/replay a stable read model.
// Dependencies: sentinel-core, serde
// ============================================================================

use sentinel_core::AgentId;
use sentinel_core::Instant;
use sentinel_core::SessionId;
use sentinel_core::TenantId;
use serde::Deserialize;
use serde::Serialize;

use crate::filter::SessionStatus;

/// Token totals accumulated from `llm_response` events (§4.3 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenTotals {
    /// Prompt/input tokens.
    pub input_tokens: u64,
    /// Completion/output tokens.
    pub output_tokens: u64,
}

impl TokenTotals {
    /// Total tokens across both directions.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A session: the projection of all events sharing a session id (§3).
///
/// # Invariants
/// - `event_count` equals the cardinality of events with this `id` at any
///   consistent snapshot (§8 property 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Agent that produced this session.
    pub agent_id: AgentId,
    /// Agent display name, recorded from the `session_started` payload.
    pub agent_name: Option<String>,
    /// Instant of the first event observed for this session.
    pub started_at: Instant,
    /// Instant of the `session_ended` event, if one has been seen.
    pub ended_at: Option<Instant>,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Total events observed.
    pub event_count: u64,
    /// Events of type `tool_call`.
    pub tool_call_count: u64,
    /// Events counted as errors (§4.1 `Event::counts_as_error`).
    pub error_count: u64,
    /// Events of type `llm_call`.
    pub llm_call_count: u64,
    /// Token totals accumulated from `llm_response` events.
    pub tokens: TokenTotals,
    /// Cumulative cost in USD from `cost_tracked` events.
    pub cost_usd: f64,
    /// Tags recorded from the `session_started` payload.
    pub tags: Vec<String>,
}

impl Session {
    /// Constructs the initial projection for a session's first observed
    /// event (§4.3 step 4: "Created on first event (implicit if no
    /// session_started is seen)").
    #[must_use]
    pub fn new_from_first_event(
        id: SessionId,
        tenant_id: TenantId,
        agent_id: AgentId,
        started_at: Instant,
    ) -> Self {
        Self {
            id,
            tenant_id,
            agent_id,
            agent_name: None,
            started_at,
            ended_at: None,
            status: SessionStatus::Active,
            event_count: 0,
            tool_call_count: 0,
            error_count: 0,
            llm_call_count: 0,
            tokens: TokenTotals::default(),
            cost_usd: 0.0,
            tags: Vec::new(),
        }
    }
}
