// sentinel-daemon/src/tasks.rs
// ============================================================================
// Module: Background Loops
// Description: The three periodic jobs the daemon runs alongside the HTTP
// gateway: the guardrail tick (§4.6), the health-score cache refresh that
// feeds it (Open Question decision #4 in ../../DESIGN.md), and the daily
// retention sweep (§4.9).
// Dependencies: sentinel-analytics, sentinel-bus, sentinel-config,
// sentinel-contract, sentinel-guardrails, sentinel-ingest, sentinel-retention
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use sentinel_analytics::HealthScoreCache;
use sentinel_analytics::HealthWeights;
use sentinel_analytics::DEFAULT_WINDOW_DAYS;
use sentinel_bus::EventBus;
use sentinel_config::RetentionConfig;
use sentinel_contract::EventStore;
use sentinel_core::AdminScope;
use sentinel_core::Instant;
use sentinel_core::TenantScope;
use sentinel_guardrails::GuardrailStore;
use sentinel_ingest::ApiKeyStore;
use sentinel_retention::PlanTier;
use sentinel_retention::RetentionPolicy;

/// Plan tier assumed for a tenant that has not been assigned one
/// explicitly (Open Question decision #5, `../../DESIGN.md`): every
/// discovered tenant defaults to [`PlanTier::Pro`] unless a per-tenant
/// `retentionDays` override is configured, in which case the override wins
/// regardless of tier.
const DEFAULT_PLAN_TIER: PlanTier = PlanTier::Pro;

/// Runs the guardrail tick loop forever at `interval`, never returning.
/// One rule evaluation failing is logged and does not stop the loop.
pub async fn run_guardrail_loop(
    store: Arc<dyn EventStore>,
    guardrails: GuardrailStore,
    bus: Arc<EventBus>,
    health_scores: Arc<HealthScoreCache>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let now = Instant::now();
        match sentinel_guardrails::run_tick(store.as_ref(), &guardrails, bus.as_ref(), health_scores.as_ref(), now).await {
            Ok(results) => {
                let triggered = results.iter().filter(|result| result.triggered).count();
                tracing::debug!(rules_evaluated = results.len(), triggered, "guardrail tick complete");
            }
            Err(error) => tracing::error!(%error, "guardrail tick failed"),
        }
    }
}

/// Refreshes the health-score cache for every tenant/agent pair at
/// `interval`, so `run_guardrail_loop`'s reads of [`HealthScoreCache`]
/// never block on an analytics query (Open Question decision #4).
pub async fn run_health_refresh_loop(
    store: Arc<dyn EventStore>,
    api_keys: ApiKeyStore,
    cache: Arc<HealthScoreCache>,
    interval: Duration,
) {
    let weights = HealthWeights::default();
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let now = Instant::now();
        let tenants = match api_keys.list_tenant_ids() {
            Ok(tenants) => tenants,
            Err(error) => {
                tracing::error!(%error, "health refresh could not list tenants");
                continue;
            }
        };
        for tenant_id in tenants {
            let scope = TenantScope::new(tenant_id.clone());
            let agents = match store.get_agents(&scope).await {
                Ok(agents) => agents,
                Err(error) => {
                    tracing::warn!(%error, %tenant_id, "health refresh could not list agents");
                    continue;
                }
            };
            for agent in agents {
                match sentinel_analytics::compute_health_score(store.as_ref(), &scope, &agent.id, DEFAULT_WINDOW_DAYS, &weights, now).await {
                    Ok(score) => cache.set(&scope, &agent.id, score.overall),
                    Err(error) => tracing::warn!(%error, %tenant_id, agent_id = %agent.id, "health score computation failed"),
                }
            }
        }
    }
}

/// Runs the daily retention sweep at `interval` (the daemon schedules this
/// itself rather than relying on an external cron; `interval` is expected
/// to be roughly 24 hours, with the first tick firing once at startup).
pub async fn run_retention_loop(store: Arc<dyn EventStore>, api_keys: ApiKeyStore, config: RetentionConfig, lead_days: u32, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let now = Instant::now();
        let policies = match build_retention_policies(&api_keys, &config) {
            Ok(policies) => policies,
            Err(error) => {
                tracing::error!(%error, "retention sweep could not list tenants");
                continue;
            }
        };
        let admin = AdminScope::new();
        match sentinel_retention::run_purge_cycle(store.as_ref(), &admin, &policies, &config.tier_defaults, lead_days, now).await {
            Ok(report) => {
                tracing::info!(
                    tenants_swept = report.outcomes.len(),
                    partitions_dropped = report.partitions_dropped,
                    "retention sweep complete"
                );
            }
            Err(error) => tracing::error!(%error, "retention sweep failed"),
        }
    }
}

/// Resolves one [`RetentionPolicy`] per tenant discovered via
/// `api_keys.list_tenant_ids`, defaulting every tenant to
/// [`DEFAULT_PLAN_TIER`] and applying a matching `config.overrides` entry
/// when present.
fn build_retention_policies(
    api_keys: &ApiKeyStore,
    config: &RetentionConfig,
) -> Result<Vec<RetentionPolicy>, sentinel_ingest::ApiKeyStoreError> {
    let tenants = api_keys.list_tenant_ids()?;
    Ok(tenants
        .into_iter()
        .map(|tenant_id| {
            let override_days = config.overrides.iter().find(|over| over.tenant_id == tenant_id).map(|over| over.retention_days);
            RetentionPolicy { tenant_id, plan_tier: DEFAULT_PLAN_TIER, override_days }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use sentinel_config::TenantRetentionOverride;
    use sentinel_core::ApiKeyId;
    use sentinel_core::KeyEnvironment;
    use sentinel_core::TenantId;
    use sentinel_core::apikey;
    use sentinel_core::apikey::ApiKeyRecord;

    use super::*;

    fn store_with_tenant(tenant: &str) -> ApiKeyStore {
        let config = sentinel_store_sqlite::SqliteStoreConfig::in_memory();
        let sqlite_store = sentinel_store_sqlite::SqliteStore::open(&config).expect("open in-memory sqlite");
        let api_keys = ApiKeyStore::new(sqlite_store.connection_handle());
        api_keys
            .put(&ApiKeyRecord {
                id: ApiKeyId::new("key-1"),
                tenant_id: TenantId::new(tenant),
                prefix: "al_test_AAAAAAAA".to_string(),
                secret_hash: apikey::hash_secret("al_test_secretsecretsecretsecret"),
                name: "ci".to_string(),
                scopes: vec!["events:write".to_string()],
                environment: KeyEnvironment::Test,
                created_at: Instant::now(),
                last_used_at: None,
                revoked_at: None,
            })
            .expect("put key");
        api_keys
    }

    #[test]
    fn tenant_with_no_override_defaults_to_pro() {
        let api_keys = store_with_tenant("acme");
        let config = RetentionConfig { tier_defaults: sentinel_retention::TierDefaults::default(), overrides: Vec::new(), lead_days: 7 };
        let policies = build_retention_policies(&api_keys, &config).expect("build policies");
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].plan_tier, PlanTier::Pro);
        assert_eq!(policies[0].override_days, None);
    }

    #[test]
    fn matching_override_is_applied() {
        let api_keys = store_with_tenant("acme");
        let config = RetentionConfig {
            tier_defaults: sentinel_retention::TierDefaults::default(),
            overrides: vec![TenantRetentionOverride { tenant_id: TenantId::new("acme"), retention_days: 14 }],
            lead_days: 7,
        };
        let policies = build_retention_policies(&api_keys, &config).expect("build policies");
        assert_eq!(policies[0].override_days, Some(14));
    }
}
