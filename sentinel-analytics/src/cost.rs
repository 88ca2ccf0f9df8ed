// sentinel-analytics/src/cost.rs
// ============================================================================
// Module: Cost Optimisation
// Description: Classifies LLM calls by complexity and recommends cheaper
// models with comparable historical success (§4.8 "Cost optimisation").
// Dependencies: sentinel-contract, sentinel-core
// ============================================================================

use sentinel_contract::EventFilter;
use sentinel_contract::EventStore;
use sentinel_contract::Order;
use sentinel_contract::SentinelError;
use sentinel_core::AgentId;
use sentinel_core::EventType;
use sentinel_core::Instant;
use sentinel_core::TenantScope;
use serde::Deserialize;
use serde::Serialize;

/// Default cost-optimisation analysis window, in days (§4.8 "default 30
/// days").
pub const DEFAULT_ANALYSIS_WINDOW_DAYS: u32 = 30;

/// Minimum calls in a complexity tier before a recommendation is considered
/// (§4.8 "if >= 10 calls fall into a tier").
const MIN_TIER_CALLS: usize = 10;

/// Maximum gap between the current model's success rate and a cheaper
/// candidate's, in percentage points, for the candidate to qualify (§4.8
/// "within 5 points").
const MAX_SUCCESS_RATE_GAP: f64 = 5.0;

/// Complexity bucket an LLM call is classified into (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    /// Low token/tool counts.
    Simple,
    /// Mid-range token/tool counts.
    Moderate,
    /// High token/tool counts.
    Complex,
}

/// Configurable thresholds used to classify a call's complexity from its
/// (input tokens, tool count, output tokens) triple (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityThresholds {
    /// Calls at or below this input-token count are `simple`.
    pub simple_max_input_tokens: u64,
    /// Calls at or below this input-token count (above `simple`) are
    /// `moderate`; above it, `complex`.
    pub moderate_max_input_tokens: u64,
    /// Calls at or below this tool count are `simple`.
    pub simple_max_tool_count: u64,
    /// Calls at or below this tool count (above `simple`) are `moderate`;
    /// above it, `complex`.
    pub moderate_max_tool_count: u64,
}

impl Default for ComplexityThresholds {
    fn default() -> Self {
        Self { simple_max_input_tokens: 500, moderate_max_input_tokens: 4_000, simple_max_tool_count: 1, moderate_max_tool_count: 4 }
    }
}

impl ComplexityThresholds {
    /// Classifies one call from its token/tool-count triple, taking the
    /// higher of the token-implied and tool-implied tier.
    #[must_use]
    pub fn classify(&self, input_tokens: u64, tool_count: u64) -> ComplexityTier {
        let by_tokens = if input_tokens <= self.simple_max_input_tokens {
            ComplexityTier::Simple
        } else if input_tokens <= self.moderate_max_input_tokens {
            ComplexityTier::Moderate
        } else {
            ComplexityTier::Complex
        };
        let by_tools = if tool_count <= self.simple_max_tool_count {
            ComplexityTier::Simple
        } else if tool_count <= self.moderate_max_tool_count {
            ComplexityTier::Moderate
        } else {
            ComplexityTier::Complex
        };
        higher_tier(by_tokens, by_tools)
    }
}

fn higher_tier(first: ComplexityTier, second: ComplexityTier) -> ComplexityTier {
    fn rank(tier: ComplexityTier) -> u8 {
        match tier {
            ComplexityTier::Simple => 0,
            ComplexityTier::Moderate => 1,
            ComplexityTier::Complex => 2,
        }
    }
    if rank(second) > rank(first) { second } else { first }
}

/// One candidate model's per-call cost and tier-scoped historical success
/// rate, keyed by the caller to whatever billing/evaluation system supplies
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCostEntry {
    /// Model identifier (matches `Event.payload.model` on `llm_call`).
    pub model: String,
    /// Complexity tier this entry's cost/success figures apply to.
    pub tier: ComplexityTier,
    /// Mean cost per call, in USD, for this model at this tier.
    pub cost_per_call_usd: f64,
    /// Historical success rate (0-100) for this model at this tier, within
    /// the tenant.
    pub success_rate: f64,
}

/// Confidence tier for a recommendation, driven by the current model's call
/// volume in the analysis window (§4.8 "Confidence").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// At least 100 calls observed.
    High,
    /// At least 50 calls observed.
    Medium,
    /// At least 10 calls observed.
    Low,
}

/// A single cost-optimisation recommendation (§4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRecommendation {
    /// Agent the recommendation applies to.
    pub agent_id: AgentId,
    /// Complexity tier the recommendation was derived from.
    pub tier: ComplexityTier,
    /// Model currently in use for this tier.
    pub current_model: String,
    /// Cheaper model with comparable success.
    pub recommended_model: String,
    /// Calls observed in this tier during the analysis window.
    pub call_count: u64,
    /// Projected monthly savings in USD, from call volume and per-call cost
    /// delta.
    pub monthly_savings_usd: f64,
    /// Confidence derived from `call_count`.
    pub confidence: Confidence,
}

fn confidence_for(call_count: usize) -> Option<Confidence> {
    if call_count >= 100 {
        Some(Confidence::High)
    } else if call_count >= 50 {
        Some(Confidence::Medium)
    } else if call_count >= MIN_TIER_CALLS {
        Some(Confidence::Low)
    } else {
        None
    }
}

/// Scans `agent_id`'s `llm_call` events over the analysis window, classifies
/// each by complexity, and emits a recommendation per tier where a cheaper
/// model with comparable success exists in `cost_table` (§4.8).
///
/// # Errors
///
/// Propagates whatever error the underlying [`EventStore::query_events`]
/// call returns.
pub async fn recommend_cost_optimizations<S: EventStore + ?Sized>(
    store: &S,
    scope: &TenantScope,
    agent_id: &AgentId,
    current_model: &str,
    cost_table: &[ModelCostEntry],
    thresholds: &ComplexityThresholds,
    window_days: u32,
    now: Instant,
) -> Result<Vec<CostRecommendation>, SentinelError> {
    let from = Instant::from_utc(now.as_utc() - chrono::Duration::days(i64::from(window_days.max(1))));
    let filter = EventFilter {
        agent_id: Some(agent_id.clone()),
        event_type: Some(EventType::LlmCall),
        from: Some(from),
        to: Some(now),
        order: Order::Asc,
        limit: Some(sentinel_contract::MAX_PAGE_SIZE),
        ..Default::default()
    };
    let page = store.query_events(scope, &filter).await?;

    let mut simple = Vec::new();
    let mut moderate = Vec::new();
    let mut complex = Vec::new();
    for event in &page.events {
        let input_tokens = event.payload.get("inputTokens").and_then(serde_json::Value::as_u64).unwrap_or(0);
        let tool_count = event.payload.get("toolCount").and_then(serde_json::Value::as_u64).unwrap_or(0);
        match thresholds.classify(input_tokens, tool_count) {
            ComplexityTier::Simple => simple.push(event),
            ComplexityTier::Moderate => moderate.push(event),
            ComplexityTier::Complex => complex.push(event),
        }
    }

    let mut recommendations = Vec::new();
    for (tier, calls) in [(ComplexityTier::Simple, &simple), (ComplexityTier::Moderate, &moderate), (ComplexityTier::Complex, &complex)] {
        if calls.len() < MIN_TIER_CALLS {
            continue;
        }
        let Some(current_entry) = cost_table.iter().find(|entry| entry.model == current_model && entry.tier == tier) else {
            continue;
        };
        let best_candidate = cost_table
            .iter()
            .filter(|entry| entry.tier == tier && entry.model != current_model)
            .filter(|entry| entry.cost_per_call_usd < current_entry.cost_per_call_usd)
            .filter(|entry| (entry.success_rate - current_entry.success_rate).abs() <= MAX_SUCCESS_RATE_GAP)
            .min_by(|a, b| a.cost_per_call_usd.partial_cmp(&b.cost_per_call_usd).unwrap_or(std::cmp::Ordering::Equal));
        let Some(candidate) = best_candidate else {
            continue;
        };
        let Some(confidence) = confidence_for(calls.len()) else {
            continue;
        };
        #[allow(clippy::cast_precision_loss, reason = "call counts never approach f64's mantissa limit")]
        let calls_per_month = (calls.len() as f64 / f64::from(window_days.max(1))) * 30.0;
        let monthly_savings_usd = calls_per_month * (current_entry.cost_per_call_usd - candidate.cost_per_call_usd);
        recommendations.push(CostRecommendation {
            agent_id: agent_id.clone(),
            tier,
            current_model: current_model.to_string(),
            recommended_model: candidate.model.clone(),
            call_count: u64::try_from(calls.len()).unwrap_or(u64::MAX),
            monthly_savings_usd,
            confidence,
        });
    }
    Ok(recommendations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_takes_the_higher_of_token_and_tool_tier() {
        let thresholds = ComplexityThresholds::default();
        assert_eq!(thresholds.classify(100, 10), ComplexityTier::Complex);
        assert_eq!(thresholds.classify(100, 0), ComplexityTier::Simple);
        assert_eq!(thresholds.classify(10_000, 0), ComplexityTier::Complex);
    }

    #[test]
    fn confidence_thresholds_match_spec_anchors() {
        assert_eq!(confidence_for(9), None);
        assert_eq!(confidence_for(10), Some(Confidence::Low));
        assert_eq!(confidence_for(50), Some(Confidence::Medium));
        assert_eq!(confidence_for(100), Some(Confidence::High));
    }
}
