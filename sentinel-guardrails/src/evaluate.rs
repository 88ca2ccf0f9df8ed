// sentinel-guardrails/src/evaluate.rs
// ============================================================================
// Module: Condition Evaluation
// Description: Turns a guardrail condition plus the event store into an
// observed value and a trigger decision (§4.6 step 2).
// Dependencies: sentinel-contract, sentinel-core
// ============================================================================

use sentinel_contract::EventFilter;
use sentinel_contract::EventStore;
use sentinel_contract::Order;
use sentinel_core::AgentId;
use sentinel_core::EventType;
use sentinel_core::Instant;
use sentinel_core::TenantScope;
use sentinel_core::extract_metric_path;

use crate::rule::Condition;

/// The result of evaluating one condition for one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationOutcome {
    /// Whether the condition's threshold was crossed.
    pub triggered: bool,
    /// The observed value compared against the threshold, for the trigger
    /// history record.
    pub observed_value: f64,
    /// The threshold it was compared against.
    pub threshold: f64,
}

/// Supplies the current health score for an agent (§4.8), decoupling this
/// crate from `sentinel-analytics` so the two can be wired together by
/// whichever binary composes them.
pub trait HealthScoreSource: Send + Sync {
    /// Returns the agent's current overall health score (0-100), or `None`
    /// if it cannot be computed (e.g. no sessions yet).
    fn overall_score(&self, scope: &TenantScope, agent_id: &AgentId) -> Option<f64>;
}

/// Evaluates `condition` for `agent_id` within `scope`, querying `store` for
/// the events the condition needs.
///
/// # Errors
///
/// Propagates whatever error the underlying [`EventStore::query_events`]
/// call returns.
pub async fn evaluate<S: EventStore + ?Sized>(
    condition: &Condition,
    store: &S,
    scope: &TenantScope,
    agent_id: &AgentId,
    now: Instant,
    health_scores: &dyn HealthScoreSource,
) -> Result<EvaluationOutcome, sentinel_contract::SentinelError> {
    match condition {
        Condition::ErrorRateThreshold { window_minutes, threshold, min_event_count } => {
            evaluate_error_rate(store, scope, agent_id, now, *window_minutes, *threshold, *min_event_count).await
        }
        Condition::CostLimit { scope: cost_scope, max_cost_usd } => {
            evaluate_cost_limit(store, scope, agent_id, now, *cost_scope, *max_cost_usd).await
        }
        Condition::HealthScoreThreshold { min_score } => {
            let observed = health_scores.overall_score(scope, agent_id).unwrap_or(100.0);
            Ok(EvaluationOutcome { triggered: observed <= *min_score, observed_value: observed, threshold: *min_score })
        }
        Condition::CustomMetric { metric_key_path, operator, value, window_minutes } => {
            evaluate_custom_metric(store, scope, agent_id, now, metric_key_path, *operator, *value, *window_minutes).await
        }
    }
}

/// Window lower bound: `now` minus `minutes`.
fn window_start(now: Instant, minutes: u32) -> Instant {
    Instant::from_utc(now.as_utc() - chrono::Duration::minutes(i64::from(minutes)))
}

async fn evaluate_error_rate<S: EventStore + ?Sized>(
    store: &S,
    scope: &TenantScope,
    agent_id: &AgentId,
    now: Instant,
    window_minutes: u32,
    threshold: f64,
    min_event_count: u32,
) -> Result<EvaluationOutcome, sentinel_contract::SentinelError> {
    let filter = EventFilter {
        agent_id: Some(agent_id.clone()),
        from: Some(window_start(now, window_minutes)),
        to: Some(now),
        order: Order::Asc,
        limit: Some(sentinel_contract::MAX_PAGE_SIZE),
        ..Default::default()
    };
    let page = store.query_events(scope, &filter).await?;
    let total = page.events.len() as u32;
    if total < min_event_count {
        return Ok(EvaluationOutcome { triggered: false, observed_value: 0.0, threshold });
    }
    let errors = page.events.iter().filter(|event| event.counts_as_error()).count();
    let fraction = f64::from(u32::try_from(errors).unwrap_or(u32::MAX)) / f64::from(total);
    let observed_value = fraction * 100.0;
    Ok(EvaluationOutcome { triggered: observed_value >= threshold, observed_value, threshold })
}

async fn evaluate_cost_limit<S: EventStore + ?Sized>(
    store: &S,
    scope: &TenantScope,
    agent_id: &AgentId,
    now: Instant,
    cost_scope: crate::rule::CostScope,
    max_cost_usd: f64,
) -> Result<EvaluationOutcome, sentinel_contract::SentinelError> {
    let from = match cost_scope {
        crate::rule::CostScope::Session => None,
        crate::rule::CostScope::Daily => Some(start_of_utc_day(now)),
    };
    let filter = EventFilter {
        agent_id: Some(agent_id.clone()),
        event_type: Some(EventType::CostTracked),
        from,
        to: Some(now),
        order: Order::Asc,
        limit: Some(sentinel_contract::MAX_PAGE_SIZE),
        ..Default::default()
    };
    let page = store.query_events(scope, &filter).await?;
    let total_cost: f64 = page.events.iter().filter_map(|event| event.payload.get("costUsd")).filter_map(serde_json::Value::as_f64).sum();
    Ok(EvaluationOutcome { triggered: total_cost >= max_cost_usd, observed_value: total_cost, threshold: max_cost_usd })
}

async fn evaluate_custom_metric<S: EventStore + ?Sized>(
    store: &S,
    scope: &TenantScope,
    agent_id: &AgentId,
    now: Instant,
    metric_key_path: &str,
    operator: crate::rule::Operator,
    value: f64,
    window_minutes: u32,
) -> Result<EvaluationOutcome, sentinel_contract::SentinelError> {
    let filter = EventFilter {
        agent_id: Some(agent_id.clone()),
        from: Some(window_start(now, window_minutes)),
        to: Some(now),
        order: Order::Asc,
        limit: Some(sentinel_contract::MAX_PAGE_SIZE),
        ..Default::default()
    };
    let page = store.query_events(scope, &filter).await?;
    let samples: Vec<f64> = page.events.iter().filter_map(|event| extract_metric_path(&event.payload, metric_key_path)).collect();
    if samples.is_empty() {
        return Ok(EvaluationOutcome { triggered: false, observed_value: 0.0, threshold: value });
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    Ok(EvaluationOutcome { triggered: operator.relates(mean, value), observed_value: mean, threshold: value })
}

/// Midnight UTC on the day containing `now`.
fn start_of_utc_day(now: Instant) -> Instant {
    let date = now.as_utc().date_naive();
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_else(|| now.as_utc().naive_utc());
    Instant::from_utc(chrono::DateTime::from_naive_utc_and_offset(midnight, chrono::Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHealth(f64);

    impl HealthScoreSource for FixedHealth {
        fn overall_score(&self, _scope: &TenantScope, _agent_id: &AgentId) -> Option<f64> {
            Some(self.0)
        }
    }

    #[test]
    fn window_start_subtracts_minutes() {
        let now = Instant::parse("2026-01-01T00:10:00.000Z").expect("parse");
        let start = window_start(now, 5);
        assert_eq!(start.to_rfc3339(), "2026-01-01T00:05:00.000Z");
    }

    #[test]
    fn health_score_threshold_triggers_at_or_below_floor() {
        let health = FixedHealth(40.0);
        assert!((health.overall_score(&TenantScope::new(sentinel_core::TenantId::new("t")), &AgentId::new("a")).unwrap() - 40.0).abs() < f64::EPSILON);
    }
}
