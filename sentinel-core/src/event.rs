// sentinel-core/src/event.rs
// ============================================================================
// Module: Sentinel Event Model
// Description: The canonical event record, its closed event-type enumeration,
// severity levels, and per-type payload validation.
// Purpose: Give every downstream component (store, bus, guardrails, replay)
// a single, hash-stable representation of an ingested event.
// Dependencies: crate::{hashing, ids, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! An [`Event`] is the atomic, append-only record of the system (§3). Its
//! `event_type` is a closed enumeration (§4.1); unknown variants are
//! rejected at deserialization rather than silently accepted, because the
//! ingest gateway must reject unknown event shapes at the boundary (§9,
//! "Dynamically-typed payloads"). Payload validation is a dispatch table
//! keyed by `event_type` (`validate_payload`), kept separate from the
//! `EventType` enum itself so the wire shape matches §3 exactly: event type
//! and payload are sibling fields, not a single tagged sum.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::hashing::HashError;
use crate::hashing::hash_canonical_json;
use crate::ids::AgentId;
use crate::ids::EventId;
use crate::ids::SessionId;
use crate::ids::TenantId;
use crate::time::Instant;

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Event severity. Defaults to [`Severity::Info`] when unspecified (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Diagnostic detail, not actionable on its own.
    Debug,
    /// Normal operational record.
    #[default]
    Info,
    /// Recoverable but noteworthy condition.
    Warn,
    /// Operation failed.
    Error,
    /// Operation failed in a way that threatens the session or tenant.
    Critical,
}

impl Severity {
    /// True for the severities the guardrail engine and session projector
    /// count as errors (§4.3, §4.6 `error_rate_threshold`).
    #[must_use]
    pub const fn counts_as_error(self) -> bool {
        matches!(self, Self::Error | Self::Critical)
    }
}

// ============================================================================
// SECTION: Event Type
// ============================================================================

/// Closed enumeration of event types (§3). Unknown values fail to
/// deserialize, which is the ingest-time rejection required by §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Session lifecycle: a session began.
    SessionStarted,
    /// Session lifecycle: a session ended.
    SessionEnded,
    /// Agent invoked a tool.
    ToolCall,
    /// Tool returned a result.
    ToolResponse,
    /// Tool invocation failed.
    ToolError,
    /// Human approval was requested.
    ApprovalRequested,
    /// Human approval was granted.
    ApprovalGranted,
    /// Human approval was denied.
    ApprovalDenied,
    /// A form was presented to a human.
    FormPresented,
    /// A form was submitted by a human.
    FormSubmitted,
    /// A cost was attributed to the session.
    CostTracked,
    /// Agent issued an LLM request.
    LlmCall,
    /// LLM returned a response.
    LlmResponse,
    /// A guardrail alert fired.
    AlertTriggered,
    /// A previously triggered alert cleared.
    AlertResolved,
    /// Caller-defined event not covered by the above.
    Custom,
}

impl EventType {
    /// Returns the wire name, matching the `snake_case` serde rendering.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::SessionEnded => "session_ended",
            Self::ToolCall => "tool_call",
            Self::ToolResponse => "tool_response",
            Self::ToolError => "tool_error",
            Self::ApprovalRequested => "approval_requested",
            Self::ApprovalGranted => "approval_granted",
            Self::ApprovalDenied => "approval_denied",
            Self::FormPresented => "form_presented",
            Self::FormSubmitted => "form_submitted",
            Self::CostTracked => "cost_tracked",
            Self::LlmCall => "llm_call",
            Self::LlmResponse => "llm_response",
            Self::AlertTriggered => "alert_triggered",
            Self::AlertResolved => "alert_resolved",
            Self::Custom => "custom",
        }
    }
}

// ============================================================================
// SECTION: Event
// ============================================================================

/// The canonical, atomic event record (§3).
///
/// # Invariants
/// - `hash` is always `compute_event_hash(self)`; callers must recompute
///   after mutating any hashed field (§4.1, §8 property 1).
/// - `prev_hash` is `None` only for the first event in a (tenant, session)
///   pair (§3 "Chain invariant").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Stable event identifier, unique within the tenant.
    pub id: EventId,
    /// Event instant.
    pub timestamp: Instant,
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Session identifier.
    pub session_id: SessionId,
    /// Agent identifier.
    pub agent_id: AgentId,
    /// Closed event-type enumeration.
    pub event_type: EventType,
    /// Severity, defaulting to [`Severity::Info`].
    #[serde(default)]
    pub severity: Severity,
    /// Type-specific payload. Validated with [`validate_payload`].
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// Opaque caller metadata, not interpreted by the core.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Hash of the immediately preceding event in this session, or `None`
    /// for the first event.
    pub prev_hash: Option<String>,
    /// Self-hash over the canonical fields (§4.1).
    pub hash: String,
}

/// The subset of an event's fields that feed the hash (§4.1). `tenant_id`
/// is intentionally excluded from the hashed fields list in §4.1's
/// description — only `{id, timestamp, sessionId, agentId, eventType,
/// severity, payload, metadata, prevHash}` are hashed — so this struct
/// mirrors that exactly, not the full `Event`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HashedFields<'a> {
    id: &'a EventId,
    timestamp: &'a Instant,
    session_id: &'a SessionId,
    agent_id: &'a AgentId,
    event_type: EventType,
    severity: Severity,
    payload: &'a Map<String, Value>,
    metadata: &'a Map<String, Value>,
    prev_hash: &'a Option<String>,
}

/// Computes the self-hash for the given hashed fields (§4.1).
///
/// # Errors
///
/// Returns [`HashError`] when canonical serialization fails (only possible
/// for payloads/metadata containing non-finite floats or map keys that do
/// not round-trip through UTF-8, both rejected earlier by JSON parsing).
pub fn compute_event_hash(
    id: &EventId,
    timestamp: &Instant,
    session_id: &SessionId,
    agent_id: &AgentId,
    event_type: EventType,
    severity: Severity,
    payload: &Map<String, Value>,
    metadata: &Map<String, Value>,
    prev_hash: &Option<String>,
) -> Result<String, HashError> {
    let fields =
        HashedFields { id, timestamp, session_id, agent_id, event_type, severity, payload, metadata, prev_hash };
    hash_canonical_json(&fields)
}

impl Event {
    /// Recomputes this event's hash from its current fields.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonical serialization fails.
    pub fn recompute_hash(&self) -> Result<String, HashError> {
        compute_event_hash(
            &self.id,
            &self.timestamp,
            &self.session_id,
            &self.agent_id,
            self.event_type,
            self.severity,
            &self.payload,
            &self.metadata,
            &self.prev_hash,
        )
    }

    /// True iff `self.hash` matches a fresh recomputation (§8 round-trip law).
    #[must_use]
    pub fn hash_is_valid(&self) -> bool {
        self.recompute_hash().map(|computed| computed == self.hash).unwrap_or(false)
    }

    /// True iff this event counts toward the error-rate window (§4.6):
    /// severity error/critical, or a `tool_error`, or a `session_ended`
    /// whose payload carries `reason: "error"`.
    #[must_use]
    pub fn counts_as_error(&self) -> bool {
        if self.severity.counts_as_error() {
            return true;
        }
        match self.event_type {
            EventType::ToolError => true,
            EventType::SessionEnded => {
                self.payload.get("reason").and_then(Value::as_str) == Some("error")
            }
            _ => false,
        }
    }
}

// ============================================================================
// SECTION: Payload Validation
// ============================================================================

/// A single failing path reported by payload validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    /// JSON-pointer-like path within the payload that failed validation.
    pub path: String,
    /// Human-readable description of the failure.
    pub message: String,
}

/// Payload validation error, carrying every failing path (§4.1: "a
/// structured error describing failing paths").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("payload validation failed: {failures:?}")]
pub struct ValidationError {
    /// All failing paths collected during validation.
    pub failures: Vec<ValidationFailure>,
}

impl ValidationError {
    fn single(path: &str, message: impl Into<String>) -> Self {
        Self { failures: vec![ValidationFailure { path: path.to_string(), message: message.into() }] }
    }
}

/// Required-field rule used by [`validate_payload`]'s dispatch table.
struct FieldRule {
    path: &'static str,
    check: fn(&Value) -> bool,
    expectation: &'static str,
}

fn is_string(value: &Value) -> bool {
    value.is_string()
}
fn is_number(value: &Value) -> bool {
    value.is_number()
}

/// Validates a payload against the schema for its event type (§4.1).
///
/// # Errors
///
/// Returns [`ValidationError`] listing every failing path when the payload
/// does not satisfy the type's required fields.
pub fn validate_payload(event_type: EventType, payload: &Map<String, Value>) -> Result<(), ValidationError> {
    let rules: &[FieldRule] = match event_type {
        EventType::SessionStarted => &[],
        EventType::SessionEnded => &[FieldRule { path: "reason", check: is_string, expectation: "string" }],
        EventType::ToolCall => &[FieldRule { path: "toolName", check: is_string, expectation: "string" }],
        EventType::ToolResponse => &[FieldRule { path: "toolName", check: is_string, expectation: "string" }],
        EventType::ToolError => &[
            FieldRule { path: "toolName", check: is_string, expectation: "string" },
            FieldRule { path: "message", check: is_string, expectation: "string" },
        ],
        EventType::ApprovalRequested | EventType::ApprovalGranted | EventType::ApprovalDenied => {
            &[FieldRule { path: "approvalId", check: is_string, expectation: "string" }]
        }
        EventType::FormPresented | EventType::FormSubmitted => {
            &[FieldRule { path: "formId", check: is_string, expectation: "string" }]
        }
        EventType::CostTracked => &[FieldRule { path: "costUsd", check: is_number, expectation: "number" }],
        EventType::LlmCall => &[FieldRule { path: "model", check: is_string, expectation: "string" }],
        EventType::LlmResponse => &[FieldRule { path: "model", check: is_string, expectation: "string" }],
        EventType::AlertTriggered | EventType::AlertResolved => {
            &[FieldRule { path: "ruleId", check: is_string, expectation: "string" }]
        }
        EventType::Custom => &[],
    };

    let mut failures = Vec::new();
    for rule in rules {
        match payload.get(rule.path) {
            None => failures.push(ValidationFailure {
                path: rule.path.to_string(),
                message: format!("missing required field (expected {})", rule.expectation),
            }),
            Some(value) if !(rule.check)(value) => failures.push(ValidationFailure {
                path: rule.path.to_string(),
                message: format!("expected {}", rule.expectation),
            }),
            Some(_) => {}
        }
    }

    if event_type == EventType::CostTracked {
        if let Some(cost) = payload.get("costUsd").and_then(Value::as_f64) {
            if cost < 0.0 {
                failures.push(ValidationFailure {
                    path: "costUsd".to_string(),
                    message: "must be non-negative".to_string(),
                });
            }
        }
    }

    if failures.is_empty() { Ok(()) } else { Err(ValidationError { failures }) }
}

/// Extracts a numeric value at a dotted path within a payload (used by the
/// guardrail engine's `custom_metric` condition, §4.6).
#[must_use]
pub fn extract_metric_path(payload: &Map<String, Value>, key_path: &str) -> Option<f64> {
    let mut current: &Value = &Value::Object(payload.clone());
    for segment in key_path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    current.as_f64()
}

/// Groups a borrowed slice of events by session id, preserving first-seen
/// order of sessions (used by the event store's insertion algorithm, §4.3
/// step 1).
#[must_use]
pub fn partition_by_session<'a>(events: &'a [Event]) -> Vec<(SessionId, Vec<&'a Event>)> {
    let mut order: Vec<SessionId> = Vec::new();
    let mut groups: BTreeMap<SessionId, Vec<&'a Event>> = BTreeMap::new();
    for event in events {
        groups.entry(event.session_id.clone()).or_insert_with(|| {
            order.push(event.session_id.clone());
            Vec::new()
        });
    }
    for event in events {
        if let Some(group) = groups.get_mut(&event.session_id) {
            group.push(event);
        }
    }
    order.into_iter().map(|session_id| {
        let group = groups.remove(&session_id).unwrap_or_default();
        (session_id, group)
    }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> Map<String, Value> {
        let Value::Object(map) = json!({"toolName": "search"}) else { unreachable!() };
        map
    }

    #[test]
    fn hash_changes_when_payload_changes() {
        let id = EventId::new("e1");
        let ts = Instant::parse("2026-01-01T00:00:00.000Z").expect("parse");
        let session = SessionId::new("s1");
        let agent = AgentId::new("a1");
        let empty = Map::new();
        let h1 = compute_event_hash(&id, &ts, &session, &agent, EventType::ToolCall, Severity::Info, &sample_payload(), &empty, &None).expect("hash");
        let h2 = compute_event_hash(&id, &ts, &session, &agent, EventType::ToolCall, Severity::Info, &empty, &empty, &None).expect("hash");
        assert_ne!(h1, h2);
    }

    #[test]
    fn validate_payload_rejects_missing_tool_name() {
        let err = validate_payload(EventType::ToolCall, &Map::new()).unwrap_err();
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].path, "toolName");
    }

    #[test]
    fn validate_payload_rejects_negative_cost() {
        let Value::Object(payload) = json!({"costUsd": -1.0}) else { unreachable!() };
        let err = validate_payload(EventType::CostTracked, &payload).unwrap_err();
        assert!(err.failures.iter().any(|f| f.path == "costUsd"));
    }

    #[test]
    fn extract_metric_path_walks_nested_object() {
        let Value::Object(payload) = json!({"usage": {"tokens": {"input": 42.0}}}) else { unreachable!() };
        let value = extract_metric_path(&payload, "usage.tokens.input");
        assert_eq!(value, Some(42.0));
    }

    #[test]
    fn counts_as_error_for_session_ended_with_error_reason() {
        let Value::Object(payload) = json!({"reason": "error"}) else { unreachable!() };
        let event = Event {
            id: EventId::new("e1"),
            timestamp: Instant::now(),
            tenant_id: TenantId::new("default"),
            session_id: SessionId::new("s1"),
            agent_id: AgentId::new("a1"),
            event_type: EventType::SessionEnded,
            severity: Severity::Info,
            payload,
            metadata: Map::new(),
            prev_hash: None,
            hash: "placeholder".to_string(),
        };
        assert!(event.counts_as_error());
    }

    #[test]
    fn partition_by_session_preserves_first_seen_order() {
        let mk = |session: &str| Event {
            id: EventId::new(session),
            timestamp: Instant::now(),
            tenant_id: TenantId::new("default"),
            session_id: SessionId::new(session),
            agent_id: AgentId::new("a1"),
            event_type: EventType::ToolCall,
            severity: Severity::Info,
            payload: sample_payload(),
            metadata: Map::new(),
            prev_hash: None,
            hash: "placeholder".to_string(),
        };
        let events = vec![mk("s2"), mk("s1"), mk("s2")];
        let groups = partition_by_session(&events);
        let ids: Vec<_> = groups.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1"]);
        assert_eq!(groups[0].1.len(), 2);
    }
}
