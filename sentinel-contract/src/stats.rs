// sentinel-contract/src/stats.rs
// ============================================================================
// Module: Sentinel Store Stats
// Description: Per-tenant totals returned by `getStats` (§4.2).
// Purpose: Back dashboards and the end-to-end test scenarios in §8 that
// assert on `totalEvents` after a batch insert.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

/// Per-tenant totals (§4.2 `getStats`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// Total events persisted for the tenant.
    pub total_events: u64,
    /// Total sessions persisted for the tenant.
    pub total_sessions: u64,
    /// Total agents persisted for the tenant.
    pub total_agents: u64,
}
