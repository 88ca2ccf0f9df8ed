// sentinel-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Conformance tests for the embedded EventStore/EmbeddingStore
// backend.
// Purpose: Exercise hash-chain enforcement, idempotent inserts, session and
// agent projection, retention, and similarity search end to end against a
// real SQLite file.
// Dependencies: sentinel-store-sqlite, sentinel-core, sentinel-contract,
// tempfile, tokio
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "test-only assertions and helpers are permitted"
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use sentinel_contract::EmbeddingStore;
use sentinel_contract::EventFilter;
use sentinel_contract::EventStore;
use sentinel_contract::SentinelError;
use sentinel_contract::SessionFilter;
use sentinel_contract::SessionStatus;
use sentinel_contract::SimilarityFilter;
use sentinel_core::AgentId;
use sentinel_core::Event;
use sentinel_core::EventType;
use sentinel_core::Instant;
use sentinel_core::Severity;
use sentinel_core::SessionId;
use sentinel_core::TenantId;
use sentinel_core::TenantScope;
use sentinel_core::compute_event_hash;
use sentinel_store_sqlite::SqliteStore;
use sentinel_store_sqlite::SqliteStoreConfig;
use serde_json::Map;
use serde_json::Value;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn store_at(dir: &TempDir) -> SqliteStore {
    let config = SqliteStoreConfig::at(dir.path().join("sentinel.sqlite"));
    SqliteStore::open(&config).expect("store open")
}

fn scope() -> TenantScope {
    TenantScope::new(TenantId::new("acme"))
}

fn event(
    session_id: &str,
    event_type: EventType,
    prev_hash: Option<String>,
    payload: Map<String, Value>,
) -> Event {
    event_at(session_id, event_type, prev_hash, payload, Instant::now())
}

fn event_at(
    session_id: &str,
    event_type: EventType,
    prev_hash: Option<String>,
    payload: Map<String, Value>,
    timestamp: Instant,
) -> Event {
    let id = sentinel_core::EventId::new(format!("{session_id}-{event_type:?}-{}", payload.len()));
    let agent_id = AgentId::new("agent-1");
    let session = SessionId::new(session_id);
    let severity = Severity::Info;
    let metadata = Map::new();
    let hash = compute_event_hash(&id, &timestamp, &session, &agent_id, event_type, severity, &payload, &metadata, &prev_hash)
        .expect("hash");
    Event {
        id,
        timestamp,
        tenant_id: TenantId::new("acme"),
        session_id: session,
        agent_id,
        event_type,
        severity,
        payload,
        metadata,
        prev_hash,
        hash,
    }
}

fn payload(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
}

// ============================================================================
// SECTION: Hash chain
// ============================================================================

#[tokio::test]
async fn inserts_a_valid_chain_and_projects_session() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir);
    let scope = scope();

    let started = event(
        "sess-1",
        EventType::SessionStarted,
        None,
        payload(&[("agentName", Value::String("assistant".to_string())), ("tags", Value::Array(vec![]))]),
    );
    let tool_call =
        event("sess-1", EventType::ToolCall, Some(started.hash.clone()), payload(&[("toolName", Value::String("search".to_string()))]));
    let ended = event(
        "sess-1",
        EventType::SessionEnded,
        Some(tool_call.hash.clone()),
        payload(&[("reason", Value::String("complete".to_string()))]),
    );

    store.insert_events(&scope, vec![started, tool_call, ended]).await.expect("insert batch");

    let stats = store.get_stats(&scope).await.expect("stats");
    assert_eq!(stats.total_events, 3);
    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.total_agents, 1);

    let session = store
        .get_session(&scope, &SessionId::new("sess-1"))
        .await
        .expect("get session")
        .expect("session exists");
    assert_eq!(session.event_count, 3);
    assert_eq!(session.tool_call_count, 1);
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.agent_name.as_deref(), Some("assistant"));
}

#[tokio::test]
async fn session_count_increments_even_without_a_session_started_event() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir);
    let scope = scope();

    // A backfilled or implicit session can arrive with a tool_call as its
    // first event, with no session_started in the batch at all (§4.3: new
    // session is decided by first appearance of the session id, not by
    // event type).
    let tool_call = event("sess-implicit", EventType::ToolCall, None, payload(&[("toolName", Value::String("search".to_string()))]));
    store.insert_events(&scope, vec![tool_call]).await.expect("insert implicit session");

    let agent = store.get_agent(&scope, &AgentId::new("agent-1")).await.expect("get agent").expect("agent exists");
    assert_eq!(agent.session_count, 1);

    // A second, distinct session for the same agent must bump the count
    // again, still with no session_started event.
    let second = event("sess-implicit-2", EventType::ToolCall, None, payload(&[("toolName", Value::String("search".to_string()))]));
    store.insert_events(&scope, vec![second]).await.expect("insert second implicit session");

    let agent = store.get_agent(&scope, &AgentId::new("agent-1")).await.expect("get agent").expect("agent exists");
    assert_eq!(agent.session_count, 2);

    // A further event for a session id already seen must not bump the count.
    let followup =
        event("sess-implicit", EventType::ToolCall, None, payload(&[("toolName", Value::String("fetch".to_string()))]));
    store.insert_events(&scope, vec![followup]).await.expect("insert followup");

    let agent = store.get_agent(&scope, &AgentId::new("agent-1")).await.expect("get agent").expect("agent exists");
    assert_eq!(agent.session_count, 2);
}

#[tokio::test]
async fn last_seen_does_not_regress_on_an_out_of_order_event() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir);
    let scope = scope();

    let later = Instant::parse("2026-01-01T00:00:10.000Z").expect("parse later");
    let earlier = Instant::parse("2026-01-01T00:00:01.000Z").expect("parse earlier");

    let first = event_at("sess-a", EventType::ToolCall, None, payload(&[]), later);
    store.insert_events(&scope, vec![first]).await.expect("insert later event");

    let agent = store.get_agent(&scope, &AgentId::new("agent-1")).await.expect("get agent").expect("agent exists");
    assert_eq!(agent.last_seen.to_rfc3339(), later.to_rfc3339());

    // Batches are not guaranteed sorted by timestamp; an out-of-order event
    // with an earlier timestamp must not move last_seen backward (§4.3).
    let second = event_at("sess-b", EventType::ToolCall, None, payload(&[]), earlier);
    store.insert_events(&scope, vec![second]).await.expect("insert earlier event");

    let agent = store.get_agent(&scope, &AgentId::new("agent-1")).await.expect("get agent").expect("agent exists");
    assert_eq!(agent.last_seen.to_rfc3339(), later.to_rfc3339(), "last_seen must remain monotonic");
}

#[tokio::test]
async fn rejects_batch_with_broken_prev_hash() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir);
    let scope = scope();

    let first = event("sess-2", EventType::SessionStarted, None, payload(&[]));
    let second = event(
        "sess-2",
        EventType::ToolCall,
        Some("not-the-real-hash".to_string()),
        payload(&[("toolName", Value::String("x".to_string()))]),
    );

    let result = store.insert_events(&scope, vec![first, second]).await;
    assert!(matches!(result, Err(SentinelError::HashChain(_))));

    let page = store.query_events(&scope, &EventFilter::default()).await.expect("query");
    assert_eq!(page.total, 0, "rejected batch must not leave partial rows");
}

#[tokio::test]
async fn reinserting_an_identical_event_is_idempotent() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir);
    let scope = scope();

    let first = event("sess-3", EventType::SessionStarted, None, payload(&[]));
    store.insert_events(&scope, vec![first.clone()]).await.expect("first insert");
    store.insert_events(&scope, vec![first]).await.expect("idempotent reinsert");

    let stats = store.get_stats(&scope).await.expect("stats");
    assert_eq!(stats.total_events, 1);
}

#[tokio::test]
async fn reinserting_a_conflicting_event_id_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir);
    let scope = scope();

    let first = event("sess-4", EventType::SessionStarted, None, payload(&[]));
    let mut conflicting = first.clone();
    conflicting.metadata.insert("different".to_string(), Value::Bool(true));
    conflicting.hash = compute_event_hash(
        &conflicting.id,
        &conflicting.timestamp,
        &conflicting.session_id,
        &conflicting.agent_id,
        conflicting.event_type,
        conflicting.severity,
        &conflicting.payload,
        &conflicting.metadata,
        &conflicting.prev_hash,
    )
    .expect("hash");

    store.insert_events(&scope, vec![first]).await.expect("first insert");
    let result = store.insert_events(&scope, vec![conflicting]).await;
    assert!(matches!(result, Err(SentinelError::Conflict(_))));
}

// ============================================================================
// SECTION: Queries
// ============================================================================

#[tokio::test]
async fn query_events_filters_by_minimum_severity() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir);
    let scope = scope();

    let mut started = event("sess-5", EventType::SessionStarted, None, payload(&[]));
    started.severity = Severity::Debug;
    started.hash = compute_event_hash(
        &started.id,
        &started.timestamp,
        &started.session_id,
        &started.agent_id,
        started.event_type,
        started.severity,
        &started.payload,
        &started.metadata,
        &started.prev_hash,
    )
    .expect("hash");

    let mut failed = event("sess-5", EventType::ToolError, Some(started.hash.clone()), payload(&[("toolName", Value::String("x".to_string())), ("message", Value::String("boom".to_string()))]));
    failed.severity = Severity::Error;
    failed.hash = compute_event_hash(
        &failed.id,
        &failed.timestamp,
        &failed.session_id,
        &failed.agent_id,
        failed.event_type,
        failed.severity,
        &failed.payload,
        &failed.metadata,
        &failed.prev_hash,
    )
    .expect("hash");

    store.insert_events(&scope, vec![started, failed]).await.expect("insert");

    let filter = EventFilter { severity: Some(Severity::Warn), ..Default::default() };
    let page = store.query_events(&scope, &filter).await.expect("query");
    assert_eq!(page.total, 1, "only the error-severity event should pass a warn-and-above filter");
}

#[tokio::test]
async fn get_sessions_respects_tenant_isolation() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir);

    let acme = TenantScope::new(TenantId::new("acme"));
    let globex = TenantScope::new(TenantId::new("globex"));

    let acme_event = event("sess-6", EventType::SessionStarted, None, payload(&[]));
    store.insert_events(&acme, vec![acme_event]).await.expect("insert acme");

    let globex_sessions = store.get_sessions(&globex, &SessionFilter::default()).await.expect("query globex");
    assert!(globex_sessions.is_empty(), "globex must not see acme's session");

    let acme_sessions = store.get_sessions(&acme, &SessionFilter::default()).await.expect("query acme");
    assert_eq!(acme_sessions.len(), 1);

    let count = store.count_sessions(&acme, &SessionFilter::default()).await.expect("count");
    assert_eq!(count, 1);
}

// ============================================================================
// SECTION: Retention
// ============================================================================

#[tokio::test]
async fn apply_retention_deletes_events_and_orphaned_sessions() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir);
    let scope = scope();

    let old = event("sess-7", EventType::SessionStarted, None, payload(&[]));
    store.insert_events(&scope, vec![old]).await.expect("insert");

    let cutoff = Instant::from_utc(chrono::Utc::now() + chrono::Duration::seconds(60));
    let outcome = store.apply_retention(&scope, cutoff).await.expect("retention");
    assert_eq!(outcome.deleted_count, 1);

    let remaining = store.query_events(&scope, &EventFilter::default()).await.expect("query");
    assert_eq!(remaining.total, 0);

    let sessions = store.get_sessions(&scope, &SessionFilter::default()).await.expect("sessions");
    assert!(sessions.is_empty(), "session must be dropped once its only event expires");
}

#[tokio::test]
async fn count_expiring_reports_rows_within_the_lead_window() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir);
    let scope = scope();

    let old = event("sess-8", EventType::SessionStarted, None, payload(&[]));
    store.insert_events(&scope, vec![old]).await.expect("insert");

    let warning = sentinel_store_sqlite::count_expiring(&store, &scope, Instant::now(), 0, 1).expect("count expiring");
    assert_eq!(warning.rows_expiring, 1);
    assert_eq!(warning.tenant_id, *scope.tenant_id());
}

// ============================================================================
// SECTION: Embeddings
// ============================================================================

#[tokio::test]
async fn similarity_search_orders_by_score_and_respects_min_score() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir);
    let scope = scope();

    let close = sentinel_contract::Embedding {
        id: sentinel_core::EmbeddingId::new("emb-close"),
        tenant_id: TenantId::new("acme"),
        source_type: sentinel_contract::SourceType::Event,
        source_id: "evt-1".to_string(),
        content_hash: "hash-1".to_string(),
        text: "close match".to_string(),
        vector: vec![1.0, 0.0, 0.0],
        model: "test-embed".to_string(),
        dimensions: 3,
        created_at: Instant::now(),
    };
    let far = sentinel_contract::Embedding {
        id: sentinel_core::EmbeddingId::new("emb-far"),
        tenant_id: TenantId::new("acme"),
        source_type: sentinel_contract::SourceType::Event,
        source_id: "evt-2".to_string(),
        content_hash: "hash-2".to_string(),
        text: "far match".to_string(),
        vector: vec![0.0, 1.0, 0.0],
        model: "test-embed".to_string(),
        dimensions: 3,
        created_at: Instant::now(),
    };

    store.store(&scope, close).await.expect("store close");
    store.store(&scope, far).await.expect("store far");

    let filter = SimilarityFilter { min_score: Some(0.5), ..Default::default() };
    let matches = store.similarity_search(&scope, &[1.0, 0.0, 0.0], &filter).await.expect("search");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].embedding.source_id, "evt-1");
}

#[tokio::test]
async fn storing_the_same_source_twice_replaces_the_row() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir);
    let scope = scope();

    let mut embedding = sentinel_contract::Embedding {
        id: sentinel_core::EmbeddingId::new("emb-1"),
        tenant_id: TenantId::new("acme"),
        source_type: sentinel_contract::SourceType::Session,
        source_id: "sess-9".to_string(),
        content_hash: "hash-v1".to_string(),
        text: "first version".to_string(),
        vector: vec![1.0, 0.0],
        model: "test-embed".to_string(),
        dimensions: 2,
        created_at: Instant::now(),
    };
    store.store(&scope, embedding.clone()).await.expect("first store");

    embedding.content_hash = "hash-v2".to_string();
    embedding.text = "second version".to_string();
    store.store(&scope, embedding).await.expect("second store");

    let filter = SimilarityFilter::default();
    let matches = store.similarity_search(&scope, &[1.0, 0.0], &filter).await.expect("search");
    assert_eq!(matches.len(), 1, "re-storing the same source must replace, not duplicate");
    assert_eq!(matches[0].embedding.content_hash, "hash-v2");
}
