// sentinel-contract/src/agent.rs
// ============================================================================
// Module: Sentinel Agent Projection
// Description: The per-tenant agent descriptor (§3 "Agent").
// Purpose: Give the event store and guardrail engine a concrete row shape
// for agent identity, pause state, and model override.
// Dependencies: sentinel-core, serde
// ============================================================================

use sentinel_core::AgentId;
use sentinel_core::Instant;
use sentinel_core::TenantId;
use serde::Deserialize;
use serde::Serialize;

/// A per-tenant agent descriptor (§3 "Agent").
///
/// # Invariants
/// - At most one row exists per (tenant, agent id) pair at any snapshot
///   (§8 property 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Agent identifier.
    pub id: AgentId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Display name, if known.
    pub name: Option<String>,
    /// Instant this agent was first observed.
    pub first_seen: Instant,
    /// Instant this agent was last observed.
    pub last_seen: Instant,
    /// Distinct sessions observed for this agent.
    pub session_count: u64,
    /// Model override set by `downgrade_model` (§4.6).
    pub model_override: Option<String>,
    /// Instant this agent was paused by `pause_agent` (§4.6), if paused.
    pub paused_at: Option<Instant>,
    /// Reason recorded alongside `paused_at`.
    pub pause_reason: Option<String>,
}

impl AgentRecord {
    /// Constructs the initial row for an agent's first observed event
    /// (§4.3 step 4: "Auto-created on first event for an (agent, tenant)
    /// pair").
    #[must_use]
    pub fn new_from_first_sighting(id: AgentId, tenant_id: TenantId, now: Instant) -> Self {
        Self {
            id,
            tenant_id,
            name: None,
            first_seen: now,
            last_seen: now,
            session_count: 0,
            model_override: None,
            paused_at: None,
            pause_reason: None,
        }
    }

    /// True when the agent is currently paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }
}
