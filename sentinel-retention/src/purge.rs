// sentinel-retention/src/purge.rs
// ============================================================================
// Module: Retention Purge Cycle
// Description: Runs one daily sweep across every tenant, generating
// approaching-expiry warnings and invoking the storage contract's retention
// operations (§4.9).
// Dependencies: sentinel-contract, sentinel-core
// ============================================================================

use sentinel_contract::EventStore;
use sentinel_contract::ExpiryWarning;
use sentinel_contract::RetentionOutcome;
use sentinel_contract::SentinelError;
use sentinel_core::AdminScope;
use sentinel_core::Instant;
use sentinel_core::TenantScope;

use crate::policy::RetentionPolicy;
use crate::policy::TierDefaults;

/// Hour, in UTC, the retention cron is scheduled to run at (§4.9 "Daily
/// cron (03:00 UTC)").
pub const DAILY_CRON_HOUR_UTC: u32 = 3;

/// Default lead time, in days, for the approaching-expiry warning (§4.9
/// "configurable lead, default 7 days").
pub const DEFAULT_LEAD_DAYS: u32 = 7;

/// Outcome of one tenant's sweep within a purge cycle (§4.9).
#[derive(Debug, Clone)]
pub struct PurgeOutcome {
    /// Tenant the sweep ran for.
    pub scope: TenantScope,
    /// Effective retention window applied, in days.
    pub retention_days: u32,
    /// Approaching-expiry warning generated before the sweep, when
    /// retention is enabled.
    pub warning: Option<ExpiryWarning>,
    /// Result of the delete itself.
    pub outcome: RetentionOutcome,
}

/// Result of a full purge cycle across every configured tenant (§4.9).
#[derive(Debug, Clone, Default)]
pub struct PurgeReport {
    /// Per-tenant outcomes, in the order `policies` was given.
    pub outcomes: Vec<PurgeOutcome>,
    /// Partitions dropped by the global partition-maintenance step. Always
    /// zero on an embedded backend (§4.2 `drop_partitions_below` default).
    pub partitions_dropped: u64,
}

/// Runs one full retention sweep: for each tenant in `policies`, resolves
/// its effective retention window, generates an approaching-expiry warning,
/// and applies retention; then, in the partitioned backend, drops whole
/// partitions below the minimum cutoff shared by every tenant (§4.9).
///
/// A tenant whose effective retention is `<= 0` is skipped silently (§4.9).
///
/// # Errors
///
/// Returns an error only if a per-tenant store call fails; individual
/// failures do not stop the sweep for other tenants (mirroring the
/// guardrail tick's per-tenant isolation in `sentinel-guardrails::engine`).
pub async fn run_purge_cycle<S: EventStore + ?Sized>(
    store: &S,
    admin: &AdminScope,
    policies: &[RetentionPolicy],
    defaults: &TierDefaults,
    lead_days: u32,
    now: Instant,
) -> Result<PurgeReport, SentinelError> {
    let mut outcomes = Vec::with_capacity(policies.len());
    let mut min_cutoff: Option<Instant> = None;

    for policy in policies {
        let retention_days = policy.effective_retention_days(defaults);
        let scope = TenantScope::new(policy.tenant_id.clone());
        if retention_days == 0 {
            outcomes.push(PurgeOutcome { scope, retention_days, warning: None, outcome: RetentionOutcome { deleted_count: 0, skipped: true } });
            continue;
        }

        let cutoff = Instant::from_utc(now.as_utc() - chrono::Duration::days(i64::from(retention_days)));
        min_cutoff = Some(min_cutoff.map_or(cutoff, |current: Instant| if cutoff.as_utc() < current.as_utc() { cutoff } else { current }));

        let warning = match store.expiring_row_count(&scope, now, retention_days, lead_days).await {
            Ok(warning) => Some(warning),
            Err(err) => {
                tracing::warn!(tenant_id = %policy.tenant_id, error = %err, "failed to compute approaching-expiry warning");
                None
            }
        };
        if let Some(ref warning) = warning {
            if warning.rows_expiring > 0 {
                tracing::info!(
                    tenant_id = %policy.tenant_id,
                    rows_expiring = warning.rows_expiring,
                    lead_days,
                    "rows approaching retention expiry"
                );
            }
        }

        let outcome = match store.apply_retention(&scope, cutoff).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(tenant_id = %policy.tenant_id, error = %err, "retention sweep failed for tenant");
                continue;
            }
        };
        tracing::info!(tenant_id = %policy.tenant_id, deleted_count = outcome.deleted_count, "retention sweep applied");
        outcomes.push(PurgeOutcome { scope, retention_days, warning, outcome });
    }

    let partitions_dropped = if let Some(global_cutoff) = min_cutoff { store.drop_partitions_below(admin, global_cutoff).await? } else { 0 };

    Ok(PurgeReport { outcomes, partitions_dropped })
}

#[cfg(test)]
mod tests {
    use sentinel_core::TenantId;
    use sentinel_store_sqlite::SqliteStore;
    use sentinel_store_sqlite::SqliteStoreConfig;

    use super::*;
    use crate::policy::PlanTier;

    #[tokio::test]
    async fn disabled_tenant_is_skipped_silently() {
        let store = SqliteStore::open(&SqliteStoreConfig::in_memory()).expect("open store");
        let now = Instant::parse("2026-01-01T00:00:00.000Z").expect("parse");
        let policies = vec![RetentionPolicy { tenant_id: TenantId::new("acme"), plan_tier: PlanTier::Free, override_days: Some(0) }];
        let report = run_purge_cycle(&store, &AdminScope::new(), &policies, &TierDefaults::default(), DEFAULT_LEAD_DAYS, now).await.expect("purge cycle");
        assert_eq!(report.outcomes.len(), 1);
        assert!(report.outcomes[0].outcome.skipped);
        assert_eq!(report.partitions_dropped, 0);
    }

    #[tokio::test]
    async fn enabled_tenant_applies_retention_and_reports_warning() {
        let store = SqliteStore::open(&SqliteStoreConfig::in_memory()).expect("open store");
        let now = Instant::parse("2026-01-01T00:00:00.000Z").expect("parse");
        let policies = vec![RetentionPolicy { tenant_id: TenantId::new("acme"), plan_tier: PlanTier::Pro, override_days: None }];
        let report = run_purge_cycle(&store, &AdminScope::new(), &policies, &TierDefaults::default(), DEFAULT_LEAD_DAYS, now).await.expect("purge cycle");
        assert_eq!(report.outcomes.len(), 1);
        assert!(!report.outcomes[0].outcome.skipped);
        assert_eq!(report.outcomes[0].retention_days, 90);
        assert!(report.outcomes[0].warning.is_some());
    }
}
