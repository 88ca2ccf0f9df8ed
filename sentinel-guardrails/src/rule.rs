// sentinel-guardrails/src/rule.rs
// ============================================================================
// Module: Guardrail Rule
// Description: The rule, condition, and action shapes evaluated on each
// tick (§4.6).
// Dependencies: sentinel-core, serde
// ============================================================================

use sentinel_core::AgentId;
use sentinel_core::GuardrailRuleId;
use sentinel_core::Instant;
use sentinel_core::TenantId;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Operator
// ============================================================================

/// Relational operator for [`Condition::CustomMetric`] (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Strictly greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Strictly less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Equal to.
    Eq,
}

impl Operator {
    /// Applies the operator to `(observed, threshold)`.
    #[must_use]
    pub fn relates(self, observed: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => observed > threshold,
            Self::Gte => observed >= threshold,
            Self::Lt => observed < threshold,
            Self::Lte => observed <= threshold,
            Self::Eq => (observed - threshold).abs() < f64::EPSILON,
        }
    }
}

// ============================================================================
// SECTION: Cost scope
// ============================================================================

/// Aggregation scope for [`Condition::CostLimit`] (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostScope {
    /// Sum `costUsd` within the current session only.
    Session,
    /// Sum `costUsd` across the current UTC day.
    Daily,
}

// ============================================================================
// SECTION: Condition
// ============================================================================

/// A rule's trigger condition (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Trigger when the error fraction over a trailing window crosses a
    /// percentage threshold.
    ErrorRateThreshold {
        /// Trailing window, in minutes, to evaluate.
        #[serde(default = "default_window_minutes")]
        window_minutes: u32,
        /// Percentage (0-100) the error fraction must reach to trigger.
        threshold: f64,
        /// Minimum event count in the window required to evaluate at all,
        /// to avoid false positives on a near-empty window.
        #[serde(default = "default_min_event_count")]
        min_event_count: u32,
    },
    /// Trigger when summed `costUsd` reaches a ceiling.
    CostLimit {
        /// Whether to sum within the session or the UTC day.
        scope: CostScope,
        /// Ceiling, in US dollars, that triggers the rule.
        max_cost_usd: f64,
    },
    /// Trigger when the agent's current health score falls to or below a
    /// floor.
    HealthScoreThreshold {
        /// Minimum acceptable overall health score (0-100).
        min_score: f64,
    },
    /// Trigger when a numeric value extracted from event payloads relates
    /// to a threshold via `operator`.
    CustomMetric {
        /// Dotted path into each event's payload, e.g. `"latencyMs"`.
        metric_key_path: String,
        /// How the aggregated value must relate to `value` to trigger.
        operator: Operator,
        /// Threshold compared against the mean of extracted values.
        value: f64,
        /// Trailing window, in minutes, to evaluate.
        #[serde(default = "default_window_minutes")]
        window_minutes: u32,
    },
}

/// Default trailing window for conditions that need one (§4.6 "default
/// 5").
const fn default_window_minutes() -> u32 {
    5
}

/// Default floor below which a window is too sparse to evaluate.
const fn default_min_event_count() -> u32 {
    1
}

// ============================================================================
// SECTION: Action
// ============================================================================

/// An action a firing rule dispatches (§4.6 "Action dispatch").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Pause the agent and stamp a reason.
    PauseAgent,
    /// POST a JSON alert payload to a webhook URL.
    NotifyWebhook {
        /// Destination URL; rejected at dispatch time unless it passes the
        /// SSRF guard.
        url: String,
    },
    /// Override the agent's model.
    DowngradeModel {
        /// Model identifier to switch the agent to.
        target_model: String,
    },
    /// Tighten, loosen, or disable a policy in an external AgentGate
    /// deployment.
    AgentgatePolicy {
        /// Base URL of the AgentGate deployment.
        url: String,
        /// Identifier of the policy to adjust.
        policy_id: String,
        /// Requested adjustment mode.
        mode: PolicyMode,
    },
}

/// Adjustment requested of an external policy (§4.6 `agentgate_policy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Make the policy stricter.
    Tighten,
    /// Make the policy more permissive.
    Loosen,
    /// Turn the policy off entirely.
    Disable,
}

// ============================================================================
// SECTION: Rule
// ============================================================================

/// A guardrail rule as persisted in `guardrail_rules` (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailRule {
    /// Tenant this rule belongs to.
    pub tenant_id: TenantId,
    /// Rule identifier.
    pub id: GuardrailRuleId,
    /// Human-readable name.
    pub name: String,
    /// Whether the rule is evaluated at all.
    pub enabled: bool,
    /// Restricts evaluation (and any resulting action) to a single agent;
    /// `None` evaluates every agent in the tenant individually (§4.6 "Scope
    /// resolution").
    pub agent_id: Option<AgentId>,
    /// Trigger condition.
    pub condition: Condition,
    /// Actions dispatched when the rule fires.
    pub actions: Vec<Action>,
    /// Minimum time between two firings of this rule, per agent.
    pub cooldown_secs: u64,
    /// When true, a firing records history and emits `alert_triggered`
    /// without dispatching the action.
    pub dry_run: bool,
    /// Creation timestamp.
    pub created_at: Instant,
    /// Last-updated timestamp.
    pub updated_at: Instant,
}
