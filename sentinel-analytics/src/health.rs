// sentinel-analytics/src/health.rs
// ============================================================================
// Module: Health Score
// Description: Computes the five-dimension, 0-100 per-agent health score and
// its trend against the preceding window (§4.8 "Health score").
// Dependencies: sentinel-contract, sentinel-core, sentinel-guardrails
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sentinel_contract::EventFilter;
use sentinel_contract::EventStore;
use sentinel_contract::Order;
use sentinel_contract::SentinelError;
use sentinel_contract::SessionFilter;
use sentinel_contract::SessionStatus;
use sentinel_core::AgentId;
use sentinel_core::EventType;
use sentinel_core::Instant;
use sentinel_core::TenantId;
use sentinel_core::TenantScope;
use sentinel_guardrails::HealthScoreSource;
use serde::Deserialize;
use serde::Serialize;

/// Default health-score window, in days (§4.8 "default 7").
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Weighting applied to each health dimension before summing to the overall
/// score (§4.8). Must sum to within 0.95-1.05 of 1.0; [`HealthWeights::validate`]
/// enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthWeights {
    /// Weight for the `error_rate` dimension.
    pub error_rate: f64,
    /// Weight for the `cost_efficiency` dimension.
    pub cost_efficiency: f64,
    /// Weight for the `tool_success` dimension.
    pub tool_success: f64,
    /// Weight for the `latency` dimension.
    pub latency: f64,
    /// Weight for the `completion_rate` dimension.
    pub completion_rate: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self { error_rate: 0.30, cost_efficiency: 0.20, tool_success: 0.20, latency: 0.15, completion_rate: 0.15 }
    }
}

impl HealthWeights {
    /// Validates that the weights sum to within 0.95-1.05 of 1.0 (§4.8).
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Validation`] when the sum falls outside the
    /// tolerance band.
    pub fn validate(&self) -> Result<(), SentinelError> {
        let sum = self.error_rate + self.cost_efficiency + self.tool_success + self.latency + self.completion_rate;
        if (0.95..=1.05).contains(&sum) {
            Ok(())
        } else {
            Err(SentinelError::Validation(format!("health weights must sum to ~1.0, got {sum}")))
        }
    }
}

/// A single dimension's raw input and mapped 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionScore {
    /// Raw measured value before mapping (a fraction, a mean cost, etc).
    pub raw_value: f64,
    /// The value mapped onto 0-100 (§4.8 mapping table).
    pub score: f64,
}

/// Direction the score has moved relative to the preceding window of equal
/// length (§4.8 "Trend").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Delta of at least +5 versus the preceding window.
    Improving,
    /// Delta of at most -5 versus the preceding window.
    Degrading,
    /// Delta strictly between -5 and +5.
    Stable,
}

/// The complete health-score report for one agent over one window (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthScore {
    /// Agent the score was computed for.
    pub agent_id: AgentId,
    /// Window length, in days, used for this computation.
    pub window_days: u32,
    /// Per-dimension raw values and mapped scores.
    pub error_rate: DimensionScore,
    /// See [`HealthScore::error_rate`].
    pub cost_efficiency: DimensionScore,
    /// See [`HealthScore::error_rate`].
    pub tool_success: DimensionScore,
    /// See [`HealthScore::error_rate`].
    pub latency: DimensionScore,
    /// See [`HealthScore::error_rate`].
    pub completion_rate: DimensionScore,
    /// Weighted sum of the five dimension scores.
    pub overall: f64,
    /// Direction relative to the preceding window of equal length.
    pub trend: Trend,
}

/// Computes the per-agent health score over `[now - window_days, now)`,
/// comparing it against the preceding window of equal length for the trend
/// (§4.8).
///
/// # Errors
///
/// Propagates whatever error the underlying store queries return, or
/// [`SentinelError::Validation`] if `weights` does not sum to ~1.0.
pub async fn compute_health_score<S: EventStore + ?Sized>(
    store: &S,
    scope: &TenantScope,
    agent_id: &AgentId,
    window_days: u32,
    weights: &HealthWeights,
    now: Instant,
) -> Result<HealthScore, SentinelError> {
    weights.validate()?;
    let window_days = window_days.clamp(1, 90);
    let window = chrono::Duration::days(i64::from(window_days));
    let current_start = Instant::from_utc(now.as_utc() - window);
    let previous_start = Instant::from_utc(current_start.as_utc() - window);

    let current = raw_dimensions(store, scope, agent_id, current_start, now).await?;
    let previous = raw_dimensions(store, scope, agent_id, previous_start, current_start).await?;

    let error_rate = DimensionScore { raw_value: current.error_fraction, score: map_error_rate(current.error_fraction) };
    let cost_efficiency = DimensionScore { raw_value: current.mean_cost, score: map_cost_efficiency(current.mean_cost) };
    let tool_success = DimensionScore { raw_value: current.tool_success_fraction, score: map_tool_success(current.tool_success_fraction) };
    let latency = DimensionScore { raw_value: current.mean_duration_secs, score: map_latency(current.mean_duration_secs) };
    let completion_rate =
        DimensionScore { raw_value: current.completion_fraction, score: map_completion_rate(current.completion_fraction) };

    let overall = weights.error_rate * error_rate.score
        + weights.cost_efficiency * cost_efficiency.score
        + weights.tool_success * tool_success.score
        + weights.latency * latency.score
        + weights.completion_rate * completion_rate.score;

    let previous_overall = weights.error_rate * map_error_rate(previous.error_fraction)
        + weights.cost_efficiency * map_cost_efficiency(previous.mean_cost)
        + weights.tool_success * map_tool_success(previous.tool_success_fraction)
        + weights.latency * map_latency(previous.mean_duration_secs)
        + weights.completion_rate * map_completion_rate(previous.completion_fraction);

    let delta = overall - previous_overall;
    let trend = if delta >= 5.0 {
        Trend::Improving
    } else if delta <= -5.0 {
        Trend::Degrading
    } else {
        Trend::Stable
    };

    Ok(HealthScore { agent_id: agent_id.clone(), window_days, error_rate, cost_efficiency, tool_success, latency, completion_rate, overall, trend })
}

struct RawDimensions {
    error_fraction: f64,
    mean_cost: f64,
    tool_success_fraction: f64,
    mean_duration_secs: f64,
    completion_fraction: f64,
}

async fn raw_dimensions<S: EventStore + ?Sized>(
    store: &S,
    scope: &TenantScope,
    agent_id: &AgentId,
    from: Instant,
    to: Instant,
) -> Result<RawDimensions, SentinelError> {
    let filter = SessionFilter { agent_id: Some(agent_id.clone()), from: Some(from), to: Some(to), ..Default::default() };
    let sessions = store.get_sessions(scope, &filter).await?;
    let total = sessions.len();

    let (error_fraction, mean_cost, mean_duration_secs, completion_fraction) = if total == 0 {
        (0.0, 0.0, 0.0, 1.0)
    } else {
        let with_errors = sessions.iter().filter(|session| session.error_count > 0).count();
        let total_cost: f64 = sessions.iter().map(|session| session.cost_usd).sum();
        let total_duration: f64 = sessions
            .iter()
            .map(|session| {
                let end = session.ended_at.unwrap_or(to);
                let secs = end.as_utc().signed_duration_since(session.started_at.as_utc()).num_seconds();
                f64::from(i32::try_from(secs.max(0)).unwrap_or(i32::MAX))
            })
            .sum();
        let completed = sessions.iter().filter(|session| session.status == SessionStatus::Completed).count();
        #[allow(clippy::cast_precision_loss, reason = "session counts never approach f64's mantissa limit")]
        let total_f = total as f64;
        (with_errors as f64 / total_f, total_cost / total_f, total_duration / total_f, completed as f64 / total_f)
    };

    let tool_call_filter =
        EventFilter { agent_id: Some(agent_id.clone()), event_type: Some(EventType::ToolCall), from: Some(from), to: Some(to), order: Order::Asc, limit: Some(sentinel_contract::MAX_PAGE_SIZE), ..Default::default() };
    let tool_response_filter = EventFilter { event_type: Some(EventType::ToolResponse), ..tool_call_filter.clone() };
    let calls = store.query_events(scope, &tool_call_filter).await?.total;
    let responses = store.query_events(scope, &tool_response_filter).await?.total;
    #[allow(clippy::cast_precision_loss, reason = "event counts never approach f64's mantissa limit")]
    let tool_success_fraction = if calls == 0 { 1.0 } else { (responses as f64 / calls as f64).min(1.0) };

    Ok(RawDimensions { error_fraction, mean_cost, tool_success_fraction, mean_duration_secs, completion_fraction })
}

/// `error_rate` mapping: `100 * (1 - fraction)` (§4.8).
fn map_error_rate(fraction: f64) -> f64 {
    (100.0 * (1.0 - fraction)).clamp(0.0, 100.0)
}

/// `cost_efficiency` mapping: piecewise-linear $0->100, $0.01->70, $0.10->0
/// (§4.8).
fn map_cost_efficiency(mean_cost: f64) -> f64 {
    if mean_cost <= 0.0 {
        100.0
    } else if mean_cost <= 0.01 {
        lerp(mean_cost, 0.0, 100.0, 0.01, 70.0)
    } else if mean_cost <= 0.10 {
        lerp(mean_cost, 0.01, 70.0, 0.10, 0.0)
    } else {
        0.0
    }
}

/// `tool_success` mapping: `100 * fraction` (§4.8).
fn map_tool_success(fraction: f64) -> f64 {
    (100.0 * fraction).clamp(0.0, 100.0)
}

/// `latency` mapping: piecewise-linear 0s->100, 60s->50, 600s->0 (§4.8).
fn map_latency(mean_duration_secs: f64) -> f64 {
    if mean_duration_secs <= 0.0 {
        100.0
    } else if mean_duration_secs <= 60.0 {
        lerp(mean_duration_secs, 0.0, 100.0, 60.0, 50.0)
    } else if mean_duration_secs <= 600.0 {
        lerp(mean_duration_secs, 60.0, 50.0, 600.0, 0.0)
    } else {
        0.0
    }
}

/// `completion_rate` mapping: `100 * fraction` (§4.8).
fn map_completion_rate(fraction: f64) -> f64 {
    (100.0 * fraction).clamp(0.0, 100.0)
}

/// Linear interpolation of `x` between `(x0, y0)` and `(x1, y1)`.
fn lerp(x: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
    if (x1 - x0).abs() < f64::EPSILON {
        y0
    } else {
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

// ============================================================================
// SECTION: Health score cache
// ============================================================================

/// A synchronously-readable cache of the most recently computed overall
/// health score per (tenant, agent), refreshed out-of-band by whichever
/// binary composes this crate with `sentinel-guardrails`.
///
/// `sentinel-guardrails::evaluate::HealthScoreSource` is synchronous because
/// the guardrail tick must not block on an analytics recomputation; this
/// cache is the seam that lets the two crates stay decoupled while still
/// sharing up-to-date scores (SPEC_FULL.md §3).
#[derive(Default)]
pub struct HealthScoreCache {
    scores: RwLock<HashMap<(TenantId, AgentId), f64>>,
}

impl HealthScoreCache {
    /// Constructs an empty cache.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records the latest overall score for an agent.
    pub fn set(&self, scope: &TenantScope, agent_id: &AgentId, overall_score: f64) {
        self.scores.write().insert((scope.tenant_id().clone(), agent_id.clone()), overall_score);
    }

    /// Removes every cached score, e.g. when an agent is deleted.
    pub fn clear(&self) {
        self.scores.write().clear();
    }
}

impl HealthScoreSource for HealthScoreCache {
    fn overall_score(&self, scope: &TenantScope, agent_id: &AgentId) -> Option<f64> {
        self.scores.read().get(&(scope.tenant_id().clone(), agent_id.clone())).copied()
    }
}

#[cfg(test)]
mod tests {
    use sentinel_contract::AgentRecord;
    use sentinel_core::generate_sortable_id;
    use sentinel_core::EventId;
    use sentinel_core::Severity;
    use sentinel_store_sqlite::SqliteStore;
    use sentinel_store_sqlite::SqliteStoreConfig;

    use super::*;

    #[test]
    fn weights_reject_sum_outside_tolerance() {
        let weights = HealthWeights { error_rate: 0.1, cost_efficiency: 0.1, tool_success: 0.1, latency: 0.1, completion_rate: 0.1 };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn default_weights_validate() {
        assert!(HealthWeights::default().validate().is_ok());
    }

    #[test]
    fn cost_efficiency_mapping_matches_spec_anchors() {
        assert!((map_cost_efficiency(0.0) - 100.0).abs() < 1e-9);
        assert!((map_cost_efficiency(0.01) - 70.0).abs() < 1e-9);
        assert!((map_cost_efficiency(0.10) - 0.0).abs() < 1e-9);
        assert!((map_cost_efficiency(1.0) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn latency_mapping_matches_spec_anchors() {
        assert!((map_latency(0.0) - 100.0).abs() < 1e-9);
        assert!((map_latency(60.0) - 50.0).abs() < 1e-9);
        assert!((map_latency(600.0) - 0.0).abs() < 1e-9);
    }

    fn sample_event(tenant: &str, session: &str, agent: &str, event_type: EventType, now: Instant) -> sentinel_core::Event {
        let mut event = sentinel_core::Event {
            id: EventId::new(generate_sortable_id(0)),
            timestamp: now,
            tenant_id: TenantId::new(tenant),
            session_id: sentinel_core::SessionId::new(session),
            agent_id: AgentId::new(agent),
            event_type,
            severity: Severity::Info,
            payload: serde_json::Map::new(),
            metadata: serde_json::Map::new(),
            prev_hash: None,
            hash: String::new(),
        };
        event.hash = event.recompute_hash().unwrap_or_default();
        event
    }

    #[tokio::test]
    async fn health_score_for_clean_agent_is_near_perfect() {
        let store = SqliteStore::open(&SqliteStoreConfig::in_memory()).expect("open store");
        let now = Instant::parse("2026-01-10T00:00:00.000Z").expect("parse");
        let scope = TenantScope::new(TenantId::new("acme"));
        let agent_id = AgentId::new("agent-1");
        store.upsert_agent(&scope, AgentRecord::new_from_first_sighting(agent_id.clone(), TenantId::new("acme"), now)).await.expect("seed agent");
        store
            .insert_events(&scope, vec![sample_event("acme", "s1", "agent-1", EventType::ToolCall, now), sample_event("acme", "s1", "agent-1", EventType::ToolResponse, now)])
            .await
            .expect("insert events");

        let score = compute_health_score(&store, &scope, &agent_id, 7, &HealthWeights::default(), now).await.expect("health score");
        assert!(score.overall > 50.0, "clean agent should score reasonably well, got {}", score.overall);
    }

    #[test]
    fn cache_round_trips_a_score() {
        let cache = HealthScoreCache::new();
        let scope = TenantScope::new(TenantId::new("acme"));
        let agent_id = AgentId::new("agent-1");
        assert_eq!(cache.overall_score(&scope, &agent_id), None);
        cache.set(&scope, &agent_id, 87.5);
        assert_eq!(cache.overall_score(&scope, &agent_id), Some(87.5));
    }
}
