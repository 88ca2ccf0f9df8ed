// sentinel-guardrails/src/dispatch.rs
// ============================================================================
// Module: Action Dispatch
// Description: Executes a firing rule's actions against the agent row or an
// external HTTP target (§4.6 "Action dispatch").
// Purpose: Every action is fail-safe: a failure becomes a textual result,
// never a propagated error.
// Dependencies: reqwest, sentinel-contract, sentinel-core
// ============================================================================

use std::time::Duration;

use sentinel_contract::EventStore;
use sentinel_core::AgentId;
use sentinel_core::Event;
use sentinel_core::EventType;
use sentinel_core::Instant;
use sentinel_core::Severity;
use sentinel_core::TenantScope;
use sentinel_core::generate_sortable_id;
use serde_json::json;

use crate::rule::Action;
use crate::rule::GuardrailRule;
use crate::rule::PolicyMode;
use crate::ssrf::guard_url;

/// Deadline applied to every outbound HTTP action (§5 "Cancellation and
/// timeouts").
const ACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Textual outcome of one dispatched action, recorded on the trigger history
/// row. Never a `Result`: dispatch is fail-safe by construction (§4.6
/// "Action dispatch... all fail-safe").
pub struct ActionResult {
    /// The action that was attempted.
    pub action: &'static str,
    /// Whether the action completed without error.
    pub succeeded: bool,
    /// Human-readable detail: what happened, or why it failed.
    pub detail: String,
}

/// Fires every action configured on `rule` for `agent_id`, returning one
/// [`ActionResult`] per action in order.
pub async fn dispatch_actions<S: EventStore + ?Sized>(
    rule: &GuardrailRule,
    store: &S,
    scope: &TenantScope,
    agent_id: &AgentId,
    observed_value: f64,
    threshold: f64,
    now: Instant,
) -> Vec<ActionResult> {
    let mut results = Vec::with_capacity(rule.actions.len());
    for action in &rule.actions {
        let result = dispatch_one(action, rule, store, scope, agent_id, observed_value, threshold, now).await;
        results.push(result);
    }
    results
}

/// Dispatches a single action, matching on its variant.
#[allow(clippy::too_many_arguments, reason = "each field is a distinct piece of dispatch context, not a candidate for a struct")]
async fn dispatch_one<S: EventStore + ?Sized>(
    action: &Action,
    rule: &GuardrailRule,
    store: &S,
    scope: &TenantScope,
    agent_id: &AgentId,
    observed_value: f64,
    threshold: f64,
    now: Instant,
) -> ActionResult {
    match action {
        Action::PauseAgent => pause_agent(store, scope, agent_id, rule, now).await,
        Action::NotifyWebhook { url } => notify_webhook(url, rule, agent_id, observed_value, threshold, now).await,
        Action::DowngradeModel { target_model } => downgrade_model(store, scope, agent_id, target_model).await,
        Action::AgentgatePolicy { url, policy_id, mode } => agentgate_policy(url, policy_id, *mode).await,
    }
}

/// `pause_agent` action: stamps `paused_at`/`pause_reason` on the agent row.
async fn pause_agent<S: EventStore + ?Sized>(
    store: &S,
    scope: &TenantScope,
    agent_id: &AgentId,
    rule: &GuardrailRule,
    now: Instant,
) -> ActionResult {
    let agent = match store.get_agent(scope, agent_id).await {
        Ok(Some(agent)) => agent,
        Ok(None) => {
            return ActionResult { action: "pause_agent", succeeded: false, detail: "agent not found".to_string() };
        }
        Err(err) => {
            return ActionResult { action: "pause_agent", succeeded: false, detail: format!("lookup failed: {err}") };
        }
    };
    let mut agent = agent;
    agent.paused_at = Some(now);
    agent.pause_reason = Some(format!("guardrail rule {:?} fired", rule.name));
    match store.upsert_agent(scope, agent).await {
        Ok(()) => ActionResult { action: "pause_agent", succeeded: true, detail: "agent paused".to_string() },
        Err(err) => ActionResult { action: "pause_agent", succeeded: false, detail: format!("upsert failed: {err}") },
    }
}

/// `downgrade_model` action: sets `model_override` on the agent row.
async fn downgrade_model<S: EventStore + ?Sized>(store: &S, scope: &TenantScope, agent_id: &AgentId, target_model: &str) -> ActionResult {
    let agent = match store.get_agent(scope, agent_id).await {
        Ok(Some(agent)) => agent,
        Ok(None) => {
            return ActionResult { action: "downgrade_model", succeeded: false, detail: "agent not found".to_string() };
        }
        Err(err) => {
            return ActionResult { action: "downgrade_model", succeeded: false, detail: format!("lookup failed: {err}") };
        }
    };
    let mut agent = agent;
    agent.model_override = Some(target_model.to_string());
    match store.upsert_agent(scope, agent).await {
        Ok(()) => ActionResult {
            action: "downgrade_model",
            succeeded: true,
            detail: format!("model overridden to {target_model}"),
        },
        Err(err) => ActionResult { action: "downgrade_model", succeeded: false, detail: format!("upsert failed: {err}") },
    }
}

/// `notify_webhook` action: POSTs the alert payload to an SSRF-guarded URL.
async fn notify_webhook(
    url: &str,
    rule: &GuardrailRule,
    agent_id: &AgentId,
    observed_value: f64,
    threshold: f64,
    now: Instant,
) -> ActionResult {
    let guarded = match guard_url(url) {
        Ok(guarded) => guarded,
        Err(err) => {
            return ActionResult { action: "notify_webhook", succeeded: false, detail: format!("rejected: {err}") };
        }
    };
    let body = json!({
        "ruleId": rule.id.as_str(),
        "ruleName": rule.name,
        "conditionType": condition_type_name(rule),
        "currentValue": observed_value,
        "threshold": threshold,
        "message": format!("guardrail rule {:?} triggered for agent {}", rule.name, agent_id.as_str()),
        "agentId": agent_id.as_str(),
        "triggeredAt": now.to_rfc3339(),
    });
    let client = match reqwest::Client::builder().timeout(ACTION_TIMEOUT).build() {
        Ok(client) => client,
        Err(err) => {
            return ActionResult { action: "notify_webhook", succeeded: false, detail: format!("client build failed: {err}") };
        }
    };
    match client.post(guarded).json(&body).send().await {
        Ok(response) if response.status().is_success() => {
            ActionResult { action: "notify_webhook", succeeded: true, detail: format!("delivered, status {}", response.status()) }
        }
        Ok(response) => ActionResult {
            action: "notify_webhook",
            succeeded: false,
            detail: format!("non-success status {}", response.status()),
        },
        Err(err) => {
            tracing::warn!(error = %err, url, "guardrail webhook dispatch failed");
            ActionResult { action: "notify_webhook", succeeded: false, detail: format!("request failed: {err}") }
        }
    }
}

/// `agentgate_policy` action: PUTs a policy adjustment to an SSRF-guarded
/// AgentGate deployment.
async fn agentgate_policy(url: &str, policy_id: &str, mode: PolicyMode) -> ActionResult {
    let base = match guard_url(url) {
        Ok(base) => base,
        Err(err) => {
            return ActionResult { action: "agentgate_policy", succeeded: false, detail: format!("rejected: {err}") };
        }
    };
    let Ok(target) = base.join(&format!("api/policies/{policy_id}")) else {
        return ActionResult { action: "agentgate_policy", succeeded: false, detail: "could not build policy URL".to_string() };
    };
    let mode_str = match mode {
        PolicyMode::Tighten => "tighten",
        PolicyMode::Loosen => "loosen",
        PolicyMode::Disable => "disable",
    };
    let client = match reqwest::Client::builder().timeout(ACTION_TIMEOUT).build() {
        Ok(client) => client,
        Err(err) => {
            return ActionResult { action: "agentgate_policy", succeeded: false, detail: format!("client build failed: {err}") };
        }
    };
    match client.put(target).json(&json!({ "mode": mode_str })).send().await {
        Ok(response) if response.status().is_success() => ActionResult {
            action: "agentgate_policy",
            succeeded: true,
            detail: format!("policy {policy_id} set to {mode_str}"),
        },
        Ok(response) => ActionResult {
            action: "agentgate_policy",
            succeeded: false,
            detail: format!("non-success status {}", response.status()),
        },
        Err(err) => {
            tracing::warn!(error = %err, url, policy_id, "agentgate policy dispatch failed");
            ActionResult { action: "agentgate_policy", succeeded: false, detail: format!("request failed: {err}") }
        }
    }
}

/// Name of the rule's condition variant, for the webhook payload.
fn condition_type_name(rule: &GuardrailRule) -> &'static str {
    match &rule.condition {
        crate::rule::Condition::ErrorRateThreshold { .. } => "error_rate_threshold",
        crate::rule::Condition::CostLimit { .. } => "cost_limit",
        crate::rule::Condition::HealthScoreThreshold { .. } => "health_score_threshold",
        crate::rule::Condition::CustomMetric { .. } => "custom_metric",
    }
}

/// Builds the `alert_triggered` event emitted regardless of dry-run status
/// (§4.6 step 3).
#[must_use]
pub fn alert_triggered_event(
    rule: &GuardrailRule,
    agent_id: &AgentId,
    session_id: sentinel_core::SessionId,
    observed_value: f64,
    threshold: f64,
    action_executed: bool,
    now: Instant,
) -> Event {
    let id = sentinel_core::EventId::new(generate_sortable_id(u64::try_from(now.as_utc().timestamp_millis()).unwrap_or(0)));
    let mut payload = serde_json::Map::new();
    payload.insert("ruleId".to_string(), json!(rule.id.as_str()));
    payload.insert("ruleName".to_string(), json!(rule.name));
    payload.insert("conditionType".to_string(), json!(condition_type_name(rule)));
    payload.insert("currentValue".to_string(), json!(observed_value));
    payload.insert("threshold".to_string(), json!(threshold));
    payload.insert("actionExecuted".to_string(), json!(action_executed));
    let mut event = Event {
        id,
        timestamp: now,
        tenant_id: rule.tenant_id.clone(),
        session_id,
        agent_id: agent_id.clone(),
        event_type: EventType::AlertTriggered,
        severity: Severity::Warn,
        payload,
        metadata: serde_json::Map::new(),
        prev_hash: None,
        hash: String::new(),
    };
    event.hash = event.recompute_hash().unwrap_or_default();
    event
}
