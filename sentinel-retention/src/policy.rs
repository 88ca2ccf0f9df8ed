// sentinel-retention/src/policy.rs
// ============================================================================
// Module: Retention Policy
// Description: Resolves a tenant's effective retention window from its
// plan tier and any per-tenant override (§4.9 "resolve effective retention
// from (plan tier, per-tenant override)").
// Dependencies: sentinel-core, serde
// ============================================================================

use sentinel_core::TenantId;
use serde::Deserialize;
use serde::Serialize;

/// Billing tier a tenant is on, used to look up a default retention window
/// when no per-tenant override is set (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// Free tier.
    Free,
    /// Paid, single-tenant-scale tier.
    Pro,
    /// Paid, enterprise-scale tier.
    Enterprise,
}

/// Default retention window, in days, per plan tier. Configurable via
/// `sentinel-config` (SPEC_FULL.md §2.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDefaults {
    /// Default retention window, in days, for [`PlanTier::Free`].
    pub free_days: u32,
    /// Default retention window, in days, for [`PlanTier::Pro`].
    pub pro_days: u32,
    /// Default retention window, in days, for [`PlanTier::Enterprise`].
    pub enterprise_days: u32,
}

impl Default for TierDefaults {
    fn default() -> Self {
        Self { free_days: 30, pro_days: 90, enterprise_days: 365 }
    }
}

impl TierDefaults {
    /// Looks up the default window for a tier.
    #[must_use]
    pub const fn for_tier(&self, tier: PlanTier) -> u32 {
        match tier {
            PlanTier::Free => self.free_days,
            PlanTier::Pro => self.pro_days,
            PlanTier::Enterprise => self.enterprise_days,
        }
    }
}

/// One tenant's retention configuration: its plan tier, plus an optional
/// override that takes precedence over the tier default (§4.9). An
/// override of `Some(0)` disables retention entirely for that tenant (§4.9
/// "Skip silently when retentionDays <= 0").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    /// Tenant this policy applies to.
    pub tenant_id: TenantId,
    /// Billing tier, used when no override is set.
    pub plan_tier: PlanTier,
    /// Per-tenant override, in days. `Some(0)` disables retention.
    pub override_days: Option<u32>,
}

impl RetentionPolicy {
    /// Resolves the effective retention window in days (§4.9).
    #[must_use]
    pub const fn effective_retention_days(&self, defaults: &TierDefaults) -> u32 {
        match self.override_days {
            Some(days) => days,
            None => defaults.for_tier(self.plan_tier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_takes_precedence_over_tier_default() {
        let policy = RetentionPolicy { tenant_id: TenantId::new("acme"), plan_tier: PlanTier::Free, override_days: Some(400) };
        assert_eq!(policy.effective_retention_days(&TierDefaults::default()), 400);
    }

    #[test]
    fn zero_override_disables_retention() {
        let policy = RetentionPolicy { tenant_id: TenantId::new("acme"), plan_tier: PlanTier::Enterprise, override_days: Some(0) };
        assert_eq!(policy.effective_retention_days(&TierDefaults::default()), 0);
    }

    #[test]
    fn no_override_falls_back_to_tier_default() {
        let policy = RetentionPolicy { tenant_id: TenantId::new("acme"), plan_tier: PlanTier::Pro, override_days: None };
        assert_eq!(policy.effective_retention_days(&TierDefaults::default()), 90);
    }
}
