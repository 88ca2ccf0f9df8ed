// sentinel-guardrails/src/engine.rs
// ============================================================================
// Module: Guardrail Tick Engine
// Description: Runs one evaluation tick over every tenant's enabled rules,
// driving the per-rule state machine described in §4.6.
// Purpose: The only place that wires condition evaluation, cooldown
// bookkeeping, trigger-history recording, action dispatch, and bus emission
// together.
// Dependencies: sentinel-bus, sentinel-contract, sentinel-core
// ============================================================================

use sentinel_bus::EventBus;
use sentinel_contract::EventFilter;
use sentinel_contract::EventStore;
use sentinel_contract::Order;
use sentinel_core::AgentId;
use sentinel_core::Instant;
use sentinel_core::SessionId;
use sentinel_core::TenantId;
use sentinel_core::TenantScope;

use crate::dispatch::alert_triggered_event;
use crate::dispatch::dispatch_actions;
use crate::evaluate::HealthScoreSource;
use crate::evaluate::evaluate;
use crate::rule::GuardrailRule;
use crate::store::GuardrailStore;

/// Default interval between guardrail ticks (§4.6 "tick every 30 s by
/// default").
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;

/// Outcome recorded for one (rule, agent) pair evaluated during a tick.
#[derive(Debug, Clone)]
pub struct TickResult {
    /// Rule that was evaluated.
    pub rule_id: String,
    /// Agent the rule was evaluated against.
    pub agent_id: String,
    /// Whether the condition crossed its threshold this tick.
    pub triggered: bool,
    /// True when a trigger was suppressed by an active cooldown.
    pub suppressed_by_cooldown: bool,
}

/// Runs one tick over every enabled rule for every tenant known to
/// `guardrail_store`, evaluating against `event_store` and dispatching
/// through `bus` (§4.6).
///
/// # Errors
///
/// Returns an error only if the guardrail tables themselves cannot be read;
/// per-rule evaluation failures are logged and treated as non-triggering so
/// one broken rule cannot halt the tick for other tenants (§5 "a per-tenant
/// error is logged and isolation-preserved").
pub async fn run_tick<S: EventStore + ?Sized>(
    event_store: &S,
    guardrail_store: &GuardrailStore,
    bus: &EventBus,
    health_scores: &dyn HealthScoreSource,
    now: Instant,
) -> Result<Vec<TickResult>, crate::store::GuardrailStoreError> {
    let mut results = Vec::new();
    for tenant_id in guardrail_store.list_tenant_ids()? {
        let scope = TenantScope::new(tenant_id.clone());
        let rules = guardrail_store.list_enabled_rules(&tenant_id)?;
        for rule in rules {
            let agent_ids = match &rule.agent_id {
                Some(agent_id) => vec![agent_id.clone()],
                None => match event_store.get_agents(&scope).await {
                    Ok(agents) => agents.into_iter().map(|agent| agent.id).collect(),
                    Err(err) => {
                        tracing::warn!(tenant_id = %tenant_id, error = %err, "failed to list agents for guardrail tick");
                        continue;
                    }
                },
            };
            for agent_id in agent_ids {
                let outcome = tick_one_rule(event_store, guardrail_store, bus, health_scores, &scope, &tenant_id, &rule, &agent_id, now).await;
                results.push(outcome);
            }
        }
    }
    Ok(results)
}

#[allow(clippy::too_many_arguments, reason = "each argument is distinct tick context threaded through from run_tick")]
async fn tick_one_rule<S: EventStore + ?Sized>(
    event_store: &S,
    guardrail_store: &GuardrailStore,
    bus: &EventBus,
    health_scores: &dyn HealthScoreSource,
    scope: &TenantScope,
    tenant_id: &TenantId,
    rule: &GuardrailRule,
    agent_id: &AgentId,
    now: Instant,
) -> TickResult {
    let blank = TickResult {
        rule_id: rule.id.as_str().to_string(),
        agent_id: agent_id.as_str().to_string(),
        triggered: false,
        suppressed_by_cooldown: false,
    };

    let outcome = match evaluate(&rule.condition, event_store, scope, agent_id, now, health_scores).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(tenant_id = %tenant_id, rule_id = %rule.id, agent_id = %agent_id, error = %err, "guardrail condition evaluation failed");
            return blank;
        }
    };

    if !outcome.triggered {
        return TickResult { triggered: false, ..blank };
    }

    let (last_triggered_at, _count) = match guardrail_store.rule_state(tenant_id, &rule.id, agent_id) {
        Ok(state) => state,
        Err(err) => {
            tracing::warn!(tenant_id = %tenant_id, rule_id = %rule.id, error = %err, "failed to read guardrail rule state");
            return blank;
        }
    };
    if let Some(last) = last_triggered_at {
        let elapsed_secs = now.as_utc().signed_duration_since(last.as_utc()).num_seconds();
        let elapsed = u64::try_from(elapsed_secs).unwrap_or(0);
        if elapsed < rule.cooldown_secs {
            return TickResult { triggered: true, suppressed_by_cooldown: true, ..blank };
        }
    }

    let action_executed = !rule.dry_run;
    if action_executed {
        let results = dispatch_actions(rule, event_store, scope, agent_id, outcome.observed_value, outcome.threshold, now).await;
        for result in &results {
            if result.succeeded {
                tracing::info!(rule_id = %rule.id, action = result.action, detail = %result.detail, "guardrail action dispatched");
            } else {
                tracing::warn!(rule_id = %rule.id, action = result.action, detail = %result.detail, "guardrail action failed");
            }
        }
    }

    let detail = serde_json::json!({
        "observedValue": outcome.observed_value,
        "threshold": outcome.threshold,
        "actionExecuted": action_executed,
    });
    if let Err(err) = guardrail_store.record_trigger(tenant_id, &rule.id, agent_id, None, &now, &detail, rule.dry_run) {
        tracing::warn!(tenant_id = %tenant_id, rule_id = %rule.id, error = %err, "failed to record guardrail trigger history");
    }

    let session_id = most_recent_session(event_store, scope, agent_id).await;
    let alert = alert_triggered_event(rule, agent_id, session_id, outcome.observed_value, outcome.threshold, action_executed, now);
    bus.emit(&alert);

    TickResult { triggered: true, ..blank }
}

/// The session id of the agent's most recent event, or a synthetic
/// per-agent placeholder when the agent has no events yet (e.g. a
/// `health_score_threshold` rule firing against a brand-new agent).
async fn most_recent_session<S: EventStore + ?Sized>(event_store: &S, scope: &TenantScope, agent_id: &AgentId) -> SessionId {
    let filter = EventFilter { agent_id: Some(agent_id.clone()), order: Order::Desc, limit: Some(1), ..Default::default() };
    match event_store.query_events(scope, &filter).await {
        Ok(page) => page.events.into_iter().next().map_or_else(|| SessionId::new(format!("agent:{agent_id}")), |event| event.session_id),
        Err(_) => SessionId::new(format!("agent:{agent_id}")),
    }
}

#[cfg(test)]
mod tests {
    use sentinel_bus::SubscriptionFilter;
    use sentinel_contract::AgentRecord;
    use sentinel_core::AgentId;
    use sentinel_core::EventId;
    use sentinel_core::EventType;
    use sentinel_core::Severity;
    use sentinel_core::TenantId;
    use sentinel_core::generate_sortable_id;
    use sentinel_store_sqlite::SqliteStore;
    use sentinel_store_sqlite::SqliteStoreConfig;

    use super::*;
    use crate::rule::Action;
    use crate::rule::Condition;
    use crate::rule::CostScope;
    use crate::rule::GuardrailRuleId;

    struct ZeroHealth;

    impl HealthScoreSource for ZeroHealth {
        fn overall_score(&self, _scope: &TenantScope, _agent_id: &AgentId) -> Option<f64> {
            None
        }
    }

    fn cost_event(tenant: &str, agent: &str, cost_usd: f64, now: Instant) -> sentinel_core::Event {
        let mut payload = serde_json::Map::new();
        payload.insert("costUsd".to_string(), serde_json::json!(cost_usd));
        let mut event = sentinel_core::Event {
            id: EventId::new(generate_sortable_id(0)),
            timestamp: now,
            tenant_id: TenantId::new(tenant),
            session_id: SessionId::new("session-1"),
            agent_id: AgentId::new(agent),
            event_type: EventType::CostTracked,
            severity: Severity::Info,
            payload,
            metadata: serde_json::Map::new(),
            prev_hash: None,
            hash: String::new(),
        };
        event.hash = event.recompute_hash().unwrap_or_default();
        event
    }

    async fn fixture() -> (SqliteStore, GuardrailStore, EventBus, TenantScope, Instant) {
        let config = SqliteStoreConfig::in_memory();
        let sqlite_store = SqliteStore::open(&config).expect("open in-memory sqlite");
        let guardrail_store = GuardrailStore::new(sqlite_store.connection_handle());
        let bus = EventBus::new();
        let now = Instant::parse("2026-01-01T12:00:00.000Z").expect("parse instant");
        let scope = TenantScope::new(TenantId::new("acme"));
        sqlite_store
            .upsert_agent(&scope, AgentRecord::new_from_first_sighting(AgentId::new("agent-1"), TenantId::new("acme"), now))
            .await
            .expect("seed agent");
        (sqlite_store, guardrail_store, bus, scope, now)
    }

    #[tokio::test]
    async fn tick_fires_rule_and_emits_alert_when_cost_exceeds_limit() {
        let (sqlite_store, guardrail_store, bus, scope, now) = fixture().await;
        sqlite_store.insert_events(&scope, vec![cost_event("acme", "agent-1", 12.0, now)]).await.expect("insert event");
        let rule = GuardrailRule {
            tenant_id: TenantId::new("acme"),
            id: GuardrailRuleId::new("rule-1"),
            name: "daily cost guard".to_string(),
            enabled: true,
            agent_id: None,
            condition: Condition::CostLimit { scope: CostScope::Daily, max_cost_usd: 10.0 },
            actions: vec![Action::PauseAgent],
            cooldown_secs: 300,
            dry_run: false,
            created_at: now,
            updated_at: now,
        };
        guardrail_store.put_rule(&rule).expect("put rule");

        let (_subscription_id, mut receiver) = bus.subscribe(SubscriptionFilter::for_tenant(TenantId::new("acme")), 8);

        let results = run_tick(&sqlite_store, &guardrail_store, &bus, &ZeroHealth, now).await.expect("tick");
        assert_eq!(results.len(), 1);
        assert!(results[0].triggered);
        assert!(!results[0].suppressed_by_cooldown);

        let alert = receiver.try_recv().expect("alert emitted");
        assert_eq!(alert.event_type, EventType::AlertTriggered);

        let agent = sqlite_store.get_agent(&scope, &AgentId::new("agent-1")).await.expect("get agent").expect("agent present");
        assert!(agent.paused_at.is_some());
    }

    #[tokio::test]
    async fn tick_does_not_dispatch_or_record_when_condition_is_not_met() {
        let (sqlite_store, guardrail_store, bus, _scope, now) = fixture().await;
        let rule = GuardrailRule {
            tenant_id: TenantId::new("acme"),
            id: GuardrailRuleId::new("rule-1"),
            name: "daily cost guard".to_string(),
            enabled: true,
            agent_id: None,
            condition: Condition::CostLimit { scope: CostScope::Daily, max_cost_usd: 10.0 },
            actions: vec![Action::PauseAgent],
            cooldown_secs: 300,
            dry_run: false,
            created_at: now,
            updated_at: now,
        };
        guardrail_store.put_rule(&rule).expect("put rule");

        let results = run_tick(&sqlite_store, &guardrail_store, &bus, &ZeroHealth, now).await.expect("tick");
        assert_eq!(results.len(), 1);
        assert!(!results[0].triggered);
    }

    #[tokio::test]
    async fn second_tick_within_cooldown_is_suppressed() {
        let (sqlite_store, guardrail_store, bus, scope, now) = fixture().await;
        sqlite_store.insert_events(&scope, vec![cost_event("acme", "agent-1", 12.0, now)]).await.expect("insert event");
        let rule = GuardrailRule {
            tenant_id: TenantId::new("acme"),
            id: GuardrailRuleId::new("rule-1"),
            name: "daily cost guard".to_string(),
            enabled: true,
            agent_id: None,
            condition: Condition::CostLimit { scope: CostScope::Daily, max_cost_usd: 10.0 },
            actions: vec![Action::PauseAgent],
            cooldown_secs: 300,
            dry_run: true,
            created_at: now,
            updated_at: now,
        };
        guardrail_store.put_rule(&rule).expect("put rule");

        let first = run_tick(&sqlite_store, &guardrail_store, &bus, &ZeroHealth, now).await.expect("first tick");
        assert!(first[0].triggered);
        assert!(!first[0].suppressed_by_cooldown);

        let later = Instant::from_utc(now.as_utc() + chrono::Duration::seconds(30));
        let second = run_tick(&sqlite_store, &guardrail_store, &bus, &ZeroHealth, later).await.expect("second tick");
        assert!(second[0].triggered);
        assert!(second[0].suppressed_by_cooldown);
    }
}
