// sentinel-ingest/src/router.rs
// ============================================================================
// Module: Ingest Gateway Router
// Description: The HTTP/SSE surface of §6: event ingest/query, session
// query/replay, guardrail CRUD/status/history, and the SSE stream.
// Purpose: Adapt the storage-agnostic contract and the guardrail/analytics
// crates onto the wire shapes §6 specifies.
// Dependencies: axum, tokio-stream, sentinel-contract, sentinel-guardrails,
// sentinel-analytics, sentinel-bus
// ============================================================================

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Sse;
use axum::response::sse::Event as SseEvent;
use axum::response::sse::KeepAlive;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use futures::StreamExt;
use futures::stream::Stream;
use sentinel_bus::SubscriptionFilter;
use sentinel_contract::EventFilter;
use sentinel_contract::EventPage;
use sentinel_contract::EventStore;
use sentinel_contract::Order;
use sentinel_contract::SentinelError;
use sentinel_contract::SessionFilter;
use sentinel_contract::SessionStatus;
use sentinel_core::AgentId;
use sentinel_core::EventId;
use sentinel_core::EventType;
use sentinel_core::GuardrailRuleId;
use sentinel_core::Instant;
use sentinel_core::SessionId;
use sentinel_guardrails::Action;
use sentinel_guardrails::Condition;
use sentinel_guardrails::GuardrailRule;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;

use crate::auth::AuthenticatedTenant;
use crate::error::IngestError;
use crate::state::AppState;
use crate::validate::IngestBatch;
use crate::validate::validate_and_stamp_batch;

/// Builds the full axum router over `state` (§6).
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/events", post(post_events).get(get_events))
        .route("/api/sessions", get(get_sessions))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/replay", get(get_session_replay))
        .route("/api/guardrails", post(post_guardrail).get(get_guardrails))
        .route("/api/guardrails/history", get(get_guardrail_history))
        .route("/api/guardrails/{id}", get(get_guardrail).put(put_guardrail).delete(delete_guardrail))
        .route("/api/guardrails/{id}/status", get(get_guardrail_status))
        .route("/api/stream", get(get_stream))
        .with_state(state)
}

// ============================================================================
// SECTION: Ingest
// ============================================================================

/// Response body of a successful `POST /api/events` (§6).
#[derive(Debug, Serialize)]
struct IngestAccepted {
    ids: Vec<String>,
}

async fn post_events(
    State(state): State<AppState>,
    auth: AuthenticatedTenant,
    Json(batch): Json<IngestBatch>,
) -> Result<(StatusCode, Json<IngestAccepted>), IngestError> {
    let now = Instant::now();
    let events =
        validate_and_stamp_batch(batch, auth.scope.tenant_id(), &now).map_err(|err| IngestError::Store(SentinelError::Validation(err)))?;
    let ids: Vec<String> = events.iter().map(|event| event.id.to_string()).collect();
    for event in &events {
        state.bus.emit(event);
    }
    state.store.insert_events(&auth.scope, events).await?;
    Ok((StatusCode::ACCEPTED, Json(IngestAccepted { ids })))
}

/// Query parameters of `GET /api/events` (§6), in wire (camelCase) form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventQuery {
    session_id: Option<SessionId>,
    event_type: Option<EventType>,
    from: Option<Instant>,
    to: Option<Instant>,
    limit: Option<u32>,
    offset: Option<u32>,
    #[serde(default)]
    order: Order,
}

impl From<EventQuery> for EventFilter {
    fn from(query: EventQuery) -> Self {
        Self {
            event_type: query.event_type,
            session_id: query.session_id,
            agent_id: None,
            severity: None,
            from: query.from,
            to: query.to,
            order: query.order,
            limit: query.limit,
            offset: query.offset,
        }
    }
}

async fn get_events(
    State(state): State<AppState>,
    auth: AuthenticatedTenant,
    Query(query): Query<EventQuery>,
) -> Result<Json<EventPage>, IngestError> {
    let page = state.store.query_events(&auth.scope, &query.into()).await?;
    Ok(Json(page))
}

// ============================================================================
// SECTION: Sessions
// ============================================================================

/// Query parameters of `GET /api/sessions` (§6), in wire (camelCase) form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionQuery {
    agent_id: Option<AgentId>,
    status: Option<SessionStatus>,
    tags: Option<String>,
    from: Option<Instant>,
    to: Option<Instant>,
    limit: Option<u32>,
    offset: Option<u32>,
    #[serde(default)]
    count_only: bool,
}

impl From<SessionQuery> for SessionFilter {
    fn from(query: SessionQuery) -> Self {
        let tags = query.tags.map(|raw| raw.split(',').map(str::trim).filter(|tag| !tag.is_empty()).map(ToString::to_string).collect()).unwrap_or_default();
        Self {
            agent_id: query.agent_id,
            status: query.status,
            tags,
            from: query.from,
            to: query.to,
            limit: query.limit,
            offset: query.offset,
            count_only: query.count_only,
        }
    }
}

/// Response of `GET /api/sessions?countOnly=true` (§6).
#[derive(Debug, Serialize)]
struct SessionCount {
    count: u64,
}

async fn get_sessions(State(state): State<AppState>, auth: AuthenticatedTenant, Query(query): Query<SessionQuery>) -> Result<Json<Value>, IngestError> {
    let count_only = query.count_only;
    let filter: SessionFilter = query.into();
    if count_only {
        let count = state.store.count_sessions(&auth.scope, &filter).await?;
        return Ok(Json(serde_json::to_value(SessionCount { count }).unwrap_or(Value::Null)));
    }
    let sessions = state.store.get_sessions(&auth.scope, &filter).await?;
    Ok(Json(serde_json::to_value(sessions).unwrap_or(Value::Null)))
}

async fn get_session(State(state): State<AppState>, auth: AuthenticatedTenant, Path(id): Path<String>) -> Result<Json<Value>, IngestError> {
    let session_id = SessionId::new(id);
    let session = state.store.get_session(&auth.scope, &session_id).await?.ok_or(IngestError::NotFound)?;
    Ok(Json(serde_json::to_value(session).unwrap_or(Value::Null)))
}

/// Query parameters of `GET /api/sessions/:id/replay` (§6).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayQuery {
    offset: Option<u32>,
    limit: Option<u32>,
    event_types: Option<String>,
    #[serde(default = "default_true")]
    include_context: bool,
}

const fn default_true() -> bool {
    true
}

async fn get_session_replay(
    State(state): State<AppState>,
    auth: AuthenticatedTenant,
    Path(id): Path<String>,
    Query(query): Query<ReplayQuery>,
) -> Result<Json<sentinel_analytics::ReplayPage>, IngestError> {
    let session_id = SessionId::new(id);
    let event_types: Option<Vec<EventType>> = query.event_types.map(|raw| {
        raw.split(',').filter_map(|name| serde_json::from_value(Value::String(name.trim().to_string())).ok()).collect()
    });
    let page = sentinel_analytics::get_replay(
        &state.replay_cache,
        &*state.store,
        &auth.scope,
        &session_id,
        query.offset.unwrap_or(0),
        query.limit.unwrap_or(sentinel_contract::DEFAULT_PAGE_SIZE),
        event_types.as_deref(),
        query.include_context,
        Instant::now(),
    )
    .await?;
    Ok(Json(page))
}

// ============================================================================
// SECTION: Guardrails
// ============================================================================

/// Request body of `POST /api/guardrails` (§6 "CreateGuardrailRule").
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGuardrailRule {
    name: String,
    #[serde(default = "default_true")]
    enabled: bool,
    agent_id: Option<AgentId>,
    condition: Condition,
    actions: Vec<Action>,
    /// Cooldown in minutes, per §3 "cooldown duration (1-1440 minutes;
    /// default 15)"; converted to `cooldown_secs` for storage.
    #[serde(default = "default_cooldown_minutes")]
    cooldown_minutes: u32,
    #[serde(default)]
    dry_run: bool,
}

const fn default_cooldown_minutes() -> u32 {
    15
}

const MIN_COOLDOWN_MINUTES: u32 = 1;
const MAX_COOLDOWN_MINUTES: u32 = 1_440;

fn validate_cooldown(minutes: u32) -> Result<u64, IngestError> {
    if (MIN_COOLDOWN_MINUTES..=MAX_COOLDOWN_MINUTES).contains(&minutes) {
        Ok(u64::from(minutes) * 60)
    } else {
        Err(IngestError::Store(SentinelError::Validation(sentinel_core::ValidationError {
            failures: vec![sentinel_core::ValidationFailure {
                path: "cooldownMinutes".to_string(),
                message: format!("must be between {MIN_COOLDOWN_MINUTES} and {MAX_COOLDOWN_MINUTES}"),
            }],
        })))
    }
}

async fn post_guardrail(
    State(state): State<AppState>,
    auth: AuthenticatedTenant,
    Json(body): Json<CreateGuardrailRule>,
) -> Result<(StatusCode, Json<GuardrailRule>), IngestError> {
    let cooldown_secs = validate_cooldown(body.cooldown_minutes)?;
    let now = Instant::now();
    let millis = u64::try_from(now.as_utc().timestamp_millis()).unwrap_or(0);
    let rule = GuardrailRule {
        tenant_id: auth.scope.tenant_id().clone(),
        id: GuardrailRuleId::new(sentinel_core::generate_sortable_id(millis)),
        name: body.name,
        enabled: body.enabled,
        agent_id: body.agent_id,
        condition: body.condition,
        actions: body.actions,
        cooldown_secs,
        dry_run: body.dry_run,
        created_at: now,
        updated_at: now,
    };
    state
        .guardrails
        .put_rule(&rule)
        .map_err(|err| IngestError::Store(SentinelError::Internal(err.to_string())))?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn get_guardrails(State(state): State<AppState>, auth: AuthenticatedTenant) -> Result<Json<Vec<GuardrailRule>>, IngestError> {
    let rules =
        state.guardrails.list_rules(auth.scope.tenant_id()).map_err(|err| IngestError::Store(SentinelError::Internal(err.to_string())))?;
    Ok(Json(rules))
}

async fn get_guardrail(State(state): State<AppState>, auth: AuthenticatedTenant, Path(id): Path<String>) -> Result<Json<GuardrailRule>, IngestError> {
    let rule_id = GuardrailRuleId::new(id);
    let rule = state
        .guardrails
        .get_rule(auth.scope.tenant_id(), &rule_id)
        .map_err(|err| IngestError::Store(SentinelError::Internal(err.to_string())))?
        .ok_or(IngestError::NotFound)?;
    Ok(Json(rule))
}

async fn put_guardrail(
    State(state): State<AppState>,
    auth: AuthenticatedTenant,
    Path(id): Path<String>,
    Json(body): Json<CreateGuardrailRule>,
) -> Result<Json<GuardrailRule>, IngestError> {
    let rule_id = GuardrailRuleId::new(id);
    let existing = state
        .guardrails
        .get_rule(auth.scope.tenant_id(), &rule_id)
        .map_err(|err| IngestError::Store(SentinelError::Internal(err.to_string())))?
        .ok_or(IngestError::NotFound)?;
    let cooldown_secs = validate_cooldown(body.cooldown_minutes)?;
    let rule = GuardrailRule {
        tenant_id: existing.tenant_id,
        id: existing.id,
        name: body.name,
        enabled: body.enabled,
        agent_id: body.agent_id,
        condition: body.condition,
        actions: body.actions,
        cooldown_secs,
        dry_run: body.dry_run,
        created_at: existing.created_at,
        updated_at: Instant::now(),
    };
    state
        .guardrails
        .put_rule(&rule)
        .map_err(|err| IngestError::Store(SentinelError::Internal(err.to_string())))?;
    Ok(Json(rule))
}

async fn delete_guardrail(State(state): State<AppState>, auth: AuthenticatedTenant, Path(id): Path<String>) -> Result<StatusCode, IngestError> {
    let rule_id = GuardrailRuleId::new(id);
    state
        .guardrails
        .delete_rule(auth.scope.tenant_id(), &rule_id)
        .map_err(|err| IngestError::Store(SentinelError::Internal(err.to_string())))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Response of `GET /api/guardrails/:id/status` (§6).
#[derive(Debug, Serialize)]
struct GuardrailStatus {
    rule_id: String,
    last_triggered_at: Option<String>,
    trigger_count: u64,
}

async fn get_guardrail_status(State(state): State<AppState>, auth: AuthenticatedTenant, Path(id): Path<String>) -> Result<Json<GuardrailStatus>, IngestError> {
    let rule_id = GuardrailRuleId::new(id);
    let rule = state
        .guardrails
        .get_rule(auth.scope.tenant_id(), &rule_id)
        .map_err(|err| IngestError::Store(SentinelError::Internal(err.to_string())))?
        .ok_or(IngestError::NotFound)?;
    let agent_id = rule.agent_id.unwrap_or_else(|| AgentId::new("*"));
    let (last_triggered_at, trigger_count) = state
        .guardrails
        .rule_state(auth.scope.tenant_id(), &rule_id, &agent_id)
        .map_err(|err| IngestError::Store(SentinelError::Internal(err.to_string())))?;
    Ok(Json(GuardrailStatus {
        rule_id: rule_id.to_string(),
        last_triggered_at: last_triggered_at.map(|instant| instant.to_rfc3339()),
        trigger_count,
    }))
}

/// Query parameters of `GET /api/guardrails/history` (§6).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    rule_id: Option<String>,
    limit: Option<u32>,
}

async fn get_guardrail_history(
    State(state): State<AppState>,
    auth: AuthenticatedTenant,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<sentinel_guardrails::TriggerHistoryRecord>>, IngestError> {
    let rule_id = query.rule_id.map(GuardrailRuleId::new);
    let history = state
        .guardrails
        .trigger_history(auth.scope.tenant_id(), rule_id.as_ref(), query.limit.unwrap_or(sentinel_contract::DEFAULT_PAGE_SIZE))
        .map_err(|err| IngestError::Store(SentinelError::Internal(err.to_string())))?;
    Ok(Json(history))
}

// ============================================================================
// SECTION: Streaming
// ============================================================================

/// Query parameters of `GET /api/stream` (§6).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamQuery {
    session_id: Option<SessionId>,
    event_type: Option<EventType>,
}

/// Interval between `event: heartbeat` frames (§4.10, §6).
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

async fn get_stream(
    State(state): State<AppState>,
    auth: AuthenticatedTenant,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let filter = SubscriptionFilter {
        tenant_id: auth.scope.tenant_id().clone(),
        session_id: query.session_id,
        agent_id: None,
        event_type: query.event_type,
    };
    let (subscription_id, receiver) = state.bus.subscribe(filter, sentinel_bus::DEFAULT_HIGH_WATER_MARK);
    tracing::info!(tenant_id = %auth.scope.tenant_id(), subscription_id = ?subscription_id, "sse subscriber connected");
    let stream = ReceiverStream::new(receiver).map(|event| {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event.event_type.as_str()).data(payload))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS)))
}

#[cfg(test)]
mod tests {
    use sentinel_contract::EventStore as _;
    use sentinel_core::TenantId;
    use sentinel_store_sqlite::SqliteStore;
    use sentinel_store_sqlite::SqliteStoreConfig;

    use super::*;
    use crate::apikeys::ApiKeyStore;

    fn test_state() -> (AppState, SqliteStore) {
        let sqlite_store = SqliteStore::open(&SqliteStoreConfig::in_memory()).expect("open in-memory sqlite");
        let guardrails = sentinel_guardrails::GuardrailStore::new(sqlite_store.connection_handle());
        let api_keys = ApiKeyStore::new(sqlite_store.connection_handle());
        let store: std::sync::Arc<dyn EventStore> = std::sync::Arc::new(sqlite_store.clone());
        let state = AppState::new(store, std::sync::Arc::new(sentinel_bus::EventBus::new()), guardrails, api_keys);
        (state, sqlite_store)
    }

    #[tokio::test]
    async fn cooldown_outside_range_is_rejected() {
        let err = validate_cooldown(0).expect_err("must reject");
        assert!(matches!(err, IngestError::Store(SentinelError::Validation(_))));
        let err = validate_cooldown(1_441).expect_err("must reject");
        assert!(matches!(err, IngestError::Store(SentinelError::Validation(_))));
        assert!(validate_cooldown(15).is_ok());
    }

    #[tokio::test]
    async fn event_query_maps_camelcase_session_id() {
        let (_state, _store) = test_state();
        let query = EventQuery { session_id: Some(SessionId::new("s1")), event_type: None, from: None, to: None, limit: None, offset: None, order: Order::Asc };
        let filter: EventFilter = query.into();
        assert_eq!(filter.session_id, Some(SessionId::new("s1")));
    }

    #[tokio::test]
    async fn post_guardrail_round_trips_through_the_store() {
        let (state, _store) = test_state();
        let auth = AuthenticatedTenant {
            scope: sentinel_core::TenantScope::new(TenantId::new("acme")),
            key_id: sentinel_core::ApiKeyId::new("k1"),
            granted_scopes: vec![],
        };
        let body = CreateGuardrailRule {
            name: "cost guard".to_string(),
            enabled: true,
            agent_id: None,
            condition: Condition::CostLimit { scope: sentinel_guardrails::CostScope::Daily, max_cost_usd: 5.0 },
            actions: vec![Action::PauseAgent],
            cooldown_minutes: 15,
            dry_run: false,
        };
        let (status, Json(rule)) = post_guardrail(State(state.clone()), auth, Json(body)).await.expect("create");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(rule.cooldown_secs, 900);
        let fetched = state.guardrails.get_rule(&rule.tenant_id, &rule.id).expect("get").expect("present");
        assert_eq!(fetched.name, "cost guard");
    }
}
