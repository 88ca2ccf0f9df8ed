// sentinel-ingest/src/validate.rs
// ============================================================================
// Module: Batch Validation and Stamping
// Description: The five-step intake pipeline of §4.10: structural
// validation, payload validation, tenant stamping, timestamp stamping, id
// generation.
// Purpose: Turn client-submitted, partially-populated events into fully
// formed, hash-consistent `Event` rows before they ever reach the store.
// Dependencies: sentinel-core
// ============================================================================

use sentinel_core::AgentId;
use sentinel_core::Event;
use sentinel_core::EventId;
use sentinel_core::EventType;
use sentinel_core::Instant;
use sentinel_core::Severity;
use sentinel_core::SessionId;
use sentinel_core::TenantId;
use sentinel_core::ValidationError;
use sentinel_core::ValidationFailure;
use sentinel_core::compute_event_hash;
use sentinel_core::generate_sortable_id;
use sentinel_core::validate_payload;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

/// Wire shape of one event as submitted to `POST /api/events` (§6). Distinct
/// from [`Event`] because `id`, `timestamp`, and `tenantId` are all
/// client-optional on intake (§4.10 steps c-e), whereas the persisted
/// [`Event`] requires every field.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingEvent {
    /// Caller-supplied id. Generated by the gateway if absent (§4.10 step
    /// e).
    pub id: Option<EventId>,
    /// Caller-supplied instant. Stamped to the request's arrival time if
    /// absent (§4.10 step d).
    pub timestamp: Option<Instant>,
    /// Caller-supplied tenant id. Always overridden by the authenticated
    /// principal's tenant (§4.10 step c) — present in the wire shape only
    /// so a client that mirrors the persisted schema back doesn't fail to
    /// deserialize.
    pub tenant_id: Option<TenantId>,
    /// Session this event belongs to.
    pub session_id: SessionId,
    /// Agent that produced this event.
    pub agent_id: AgentId,
    /// Closed event-type enumeration.
    pub event_type: EventType,
    /// Severity, defaulting to [`Severity::Info`].
    #[serde(default)]
    pub severity: Severity,
    /// Type-specific payload, checked against `event_type`'s schema.
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// Opaque caller metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Hash of the preceding event in this session's chain, if any.
    pub prev_hash: Option<String>,
    /// Self-hash, present when the caller tracks its own chain and
    /// supplied both `id` and `timestamp`.
    pub hash: Option<String>,
}

/// Request body of `POST /api/events` (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct IngestBatch {
    /// Candidate events, in submission order.
    pub events: Vec<IncomingEvent>,
}

/// Validates and stamps one incoming event into its persisted form.
///
/// # Errors
///
/// Returns [`ValidationError`] if the payload fails its type-specific
/// schema (§4.10 step b).
pub fn validate_and_stamp(incoming: IncomingEvent, tenant_id: &TenantId, now: &Instant) -> Result<Event, ValidationError> {
    validate_payload(incoming.event_type, &incoming.payload)?;

    let had_id = incoming.id.is_some();
    let had_timestamp = incoming.timestamp.is_some();
    let timestamp = incoming.timestamp.unwrap_or(*now);
    let id = incoming.id.unwrap_or_else(|| {
        let millis = u64::try_from(now.as_utc().timestamp_millis()).unwrap_or(0);
        EventId::new(generate_sortable_id(millis))
    });

    // Stamping id/timestamp only matters for the hash when the caller
    // didn't already commit to them: a self-tracked chain's hash must
    // survive untouched, but a gateway-generated id/timestamp invalidates
    // any hash the caller might have sent alongside them.
    let hash = if had_id && had_timestamp {
        incoming.hash.unwrap_or_else(|| recompute(&id, &timestamp, &incoming.session_id, &incoming.agent_id, incoming.event_type, incoming.severity, &incoming.payload, &incoming.metadata, &incoming.prev_hash))
    } else {
        recompute(&id, &timestamp, &incoming.session_id, &incoming.agent_id, incoming.event_type, incoming.severity, &incoming.payload, &incoming.metadata, &incoming.prev_hash)
    };

    Ok(Event {
        id,
        timestamp,
        tenant_id: tenant_id.clone(),
        session_id: incoming.session_id,
        agent_id: incoming.agent_id,
        event_type: incoming.event_type,
        severity: incoming.severity,
        payload: incoming.payload,
        metadata: incoming.metadata,
        prev_hash: incoming.prev_hash,
        hash,
    })
}

/// Validates and stamps every event in a batch, collecting every failure
/// rather than stopping at the first (§4.10, §7 "Validation").
///
/// # Errors
///
/// Returns one [`ValidationError`] aggregating the failures of every
/// rejected event, indexed by its position in the batch, or `Ok` with the
/// fully stamped batch when every event passes.
pub fn validate_and_stamp_batch(batch: IngestBatch, tenant_id: &TenantId, now: &Instant) -> Result<Vec<Event>, ValidationError> {
    let mut stamped = Vec::with_capacity(batch.events.len());
    let mut failures = Vec::new();
    for (index, incoming) in batch.events.into_iter().enumerate() {
        match validate_and_stamp(incoming, tenant_id, now) {
            Ok(event) => stamped.push(event),
            Err(err) => {
                for failure in err.failures {
                    failures.push(ValidationFailure { path: format!("events[{index}].{}", failure.path), message: failure.message });
                }
            }
        }
    }
    if failures.is_empty() { Ok(stamped) } else { Err(ValidationError { failures }) }
}

#[allow(clippy::too_many_arguments, reason = "mirrors compute_event_hash's own parameter list; introducing a struct here would just move the arity, not reduce it")]
fn recompute(
    id: &EventId,
    timestamp: &Instant,
    session_id: &SessionId,
    agent_id: &AgentId,
    event_type: EventType,
    severity: Severity,
    payload: &Map<String, Value>,
    metadata: &Map<String, Value>,
    prev_hash: &Option<String>,
) -> String {
    compute_event_hash(id, timestamp, session_id, agent_id, event_type, severity, payload, metadata, prev_hash)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn stamps_tenant_id_and_timestamp_and_id_when_absent() {
        let incoming = IncomingEvent {
            id: None,
            timestamp: None,
            tenant_id: Some(TenantId::new("client-claimed-tenant")),
            session_id: SessionId::new("sess-1"),
            agent_id: AgentId::new("agent-1"),
            event_type: EventType::SessionStarted,
            severity: Severity::Info,
            payload: Map::new(),
            metadata: Map::new(),
            prev_hash: None,
            hash: None,
        };
        let now = Instant::now();
        let event = validate_and_stamp(incoming, &TenantId::new("real-tenant"), &now).expect("valid");
        assert_eq!(event.tenant_id, TenantId::new("real-tenant"));
        assert_eq!(event.timestamp, now);
        assert!(event.hash_is_valid());
    }

    #[test]
    fn rejects_a_payload_missing_its_required_field() {
        let incoming = IncomingEvent {
            id: None,
            timestamp: None,
            tenant_id: None,
            session_id: SessionId::new("sess-1"),
            agent_id: AgentId::new("agent-1"),
            event_type: EventType::ToolCall,
            severity: Severity::Info,
            payload: Map::new(),
            metadata: Map::new(),
            prev_hash: None,
            hash: None,
        };
        let err = validate_and_stamp(incoming, &TenantId::new("acme"), &Instant::now()).expect_err("must reject");
        assert!(err.failures.iter().any(|failure| failure.path == "toolName"));
    }

    #[test]
    fn batch_collects_failures_across_multiple_events() {
        let bad = IncomingEvent {
            id: None,
            timestamp: None,
            tenant_id: None,
            session_id: SessionId::new("sess-1"),
            agent_id: AgentId::new("agent-1"),
            event_type: EventType::ToolCall,
            severity: Severity::Info,
            payload: Map::new(),
            metadata: Map::new(),
            prev_hash: None,
            hash: None,
        };
        let mut good_payload = Map::new();
        good_payload.insert("toolName".to_string(), json!("search"));
        let good = IncomingEvent { payload: good_payload, ..bad.clone() };
        let batch = IngestBatch { events: vec![bad, good] };
        let err = validate_and_stamp_batch(batch, &TenantId::new("acme"), &Instant::now()).expect_err("must reject");
        assert_eq!(err.failures.len(), 1);
        assert!(err.failures[0].path.starts_with("events[0]."));
    }
}
