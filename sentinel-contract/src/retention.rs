// sentinel-contract/src/retention.rs
// ============================================================================
// Module: Sentinel Retention Outcome
// Description: Result types for `applyRetention` (§4.2, §4.9) and the
// approaching-expiry warning the purger can generate ahead of a sweep.
// Purpose: Give the retention purger (C9) a typed report instead of bare
// counts, per SPEC_FULL.md §3 "Approaching-expiry warning".
// Dependencies: sentinel-core, serde
// ============================================================================

use sentinel_core::TenantId;
use serde::Deserialize;
use serde::Serialize;

/// Outcome of a single `applyRetention` call (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetentionOutcome {
    /// Number of event rows deleted.
    pub deleted_count: u64,
    /// True only when retention is disabled for the tenant (§8 boundary:
    /// `retentionDays = 0`).
    pub skipped: bool,
}

/// A warning that rows will fall out of retention within the configured
/// lead window (§4.9, default lead 7 days).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryWarning {
    /// Tenant the warning applies to.
    pub tenant_id: TenantId,
    /// Number of rows that will be deleted within the lead window.
    pub rows_expiring: u64,
    /// Lead time, in days, used to compute `rows_expiring`.
    pub lead_days: u32,
}
