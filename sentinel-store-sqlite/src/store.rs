// sentinel-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Event/Embedding Store
// Description: Embedded, single-process implementation of the `EventStore`
// and `EmbeddingStore` contracts (§4.2, §4.3, §4.4).
// Purpose: Give a single-tenant or small-multi-tenant deployment a
// zero-infrastructure backend with the same semantics the partitioned
// Postgres backend provides.
// Dependencies: sentinel-core, sentinel-contract, rusqlite, serde_json,
// thiserror
// ============================================================================

//! ## Overview
//! [`SqliteStore`] holds one shared [`Connection`] behind a mutex. Every
//! operation that touches more than one table (ingestion, retention) runs
//! inside a single `SQLite` transaction, so the atomicity and chain-integrity
//! guarantees of §4.3 hold without an external lock manager. This backend
//! reports [`StorageCapabilities::embedded`]: no native vector index, no
//! partition maintenance, matching §9's "Polymorphism over backends".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use sentinel_contract::Embedding;
use sentinel_contract::EmbeddingStore;
use sentinel_contract::EventFilter;
use sentinel_contract::EventPage;
use sentinel_contract::EventStore;
use sentinel_contract::ExpiryWarning;
use sentinel_contract::Order;
use sentinel_contract::RetentionOutcome;
use sentinel_contract::Session;
use sentinel_contract::SessionFilter;
use sentinel_contract::SessionStatus;
use sentinel_contract::SentinelError;
use sentinel_contract::SimilarityFilter;
use sentinel_contract::SimilarityMatch;
use sentinel_contract::SourceType;
use sentinel_contract::StorageCapabilities;
use sentinel_contract::StoreStats;
use sentinel_contract::TokenTotals;
use sentinel_contract::cosine_similarity;
use sentinel_contract::decode_vector;
use sentinel_contract::encode_vector;
use sentinel_core::AgentId;
use sentinel_core::AgentRecord;
use sentinel_core::Event;
use sentinel_core::EventId;
use sentinel_core::Instant;
use sentinel_core::SessionId;
use sentinel_core::TenantScope;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::convert::event_type_as_str;
use crate::convert::event_type_from_str;
use crate::convert::session_status_as_str;
use crate::convert::session_status_from_str;
use crate::convert::severity_as_str;
use crate::convert::severity_from_str;
use crate::convert::source_type_as_str;
use crate::convert::source_type_from_str;
use crate::schema;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the embedded `SQLite` backend.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the database file. `:memory:` opens a private in-memory
    /// database (used by tests).
    pub path: PathBuf,
    /// Busy timeout in milliseconds before a locked write fails.
    pub busy_timeout_ms: u64,
}

impl SqliteStoreConfig {
    /// Builds a config pointing at `path` with the default busy timeout.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), busy_timeout_ms: 5_000 }
    }

    /// Builds a config for a private, non-persisted in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::at(":memory:")
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors internal to the `SQLite` backend, mapped to [`SentinelError`] at
/// the trait boundary (see `crate::convert`).
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Filesystem or connection-open failure.
    #[error("sqlite io error: {0}")]
    Io(String),
    /// `SQLite` engine error not otherwise classified.
    #[error("sqlite db error: {0}")]
    Db(String),
    /// Row present but its encoded contents do not parse.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Row absent, or present but not owned by the scoped tenant.
    #[error("not found: {0}")]
    NotFound(String),
    /// Hash-chain invariant violated by an insert batch (§3, §4.3).
    #[error("hash chain violation: {0}")]
    HashChain(String),
    /// Non-idempotent conflict (e.g. event id reused with different fields).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

fn corrupt(context: &str, error: serde_json::Error) -> SqliteStoreError {
    SqliteStoreError::Corrupt(format!("{context}: {error}"))
}

/// `CASE` expression ranking the `severity` column so a minimum-severity
/// filter (§4.2 "Restrict to a minimum severity (inclusive)") can be
/// expressed without binding the rank as a parameter.
const SEVERITY_RANK_CASE: &str =
    "(CASE severity WHEN 'debug' THEN 0 WHEN 'info' THEN 1 WHEN 'warn' THEN 2 WHEN 'error' THEN 3 WHEN 'critical' THEN 4 ELSE -1 END)";

/// Maximum candidate rows the in-memory similarity-search fallback loads
/// before ranking (§4.4 "Fallback... load at most 10 000 candidate rows").
const SIMILARITY_CANDIDATE_CAP: usize = 10_000;

const fn severity_rank(severity: sentinel_core::Severity) -> u8 {
    match severity {
        sentinel_core::Severity::Debug => 0,
        sentinel_core::Severity::Info => 1,
        sentinel_core::Severity::Warn => 2,
        sentinel_core::Severity::Error => 3,
        sentinel_core::Severity::Critical => 4,
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed event, session, agent, and embedding store.
#[derive(Clone)]
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (creating if necessary) the embedded store at the configured
    /// path and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// the schema cannot be applied.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        if let Some(parent) = parent_to_create(&config.path) {
            std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        }
        let connection = Connection::open(&config.path)?;
        connection.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
        connection.pragma_update(None, "foreign_keys", "ON")?;
        if config.path.to_string_lossy() != ":memory:" {
            connection.pragma_update(None, "journal_mode", "WAL")?;
        }
        schema::initialize(&connection)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Io("connection mutex poisoned".to_string()))
    }

    /// Returns the shared connection handle backing this store.
    ///
    /// The `guardrail_rules`/`guardrail_state`/`guardrail_trigger_history`
    /// tables are not part of the storage-agnostic [`sentinel_contract`]
    /// traits, so `sentinel-guardrails` talks to them through this raw
    /// handle rather than through a trait method.
    #[must_use]
    pub fn connection_handle(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.connection)
    }
}

fn parent_to_create(path: &Path) -> Option<&Path> {
    if path.to_string_lossy() == ":memory:" { None } else { path.parent().filter(|p| !p.as_os_str().is_empty()) }
}

// ============================================================================
// SECTION: Row <-> Event
// ============================================================================

fn event_from_row(row: &rusqlite::Row<'_>, tenant_id: &str) -> rusqlite::Result<Event> {
    let payload_bytes: Vec<u8> = row.get("payload_json")?;
    let metadata_bytes: Vec<u8> = row.get("metadata_json")?;
    let event_type_str: String = row.get("event_type")?;
    let severity_str: String = row.get("severity")?;
    let timestamp_str: String = row.get("timestamp")?;
    let payload: Map<String, Value> = parse_object(&payload_bytes).unwrap_or_default();
    let metadata: Map<String, Value> = parse_object(&metadata_bytes).unwrap_or_default();
    Ok(Event {
        id: EventId::new(row.get::<_, String>("id")?),
        timestamp: Instant::parse(&timestamp_str).unwrap_or_else(|_| Instant::now()),
        tenant_id: sentinel_core::TenantId::new(tenant_id.to_string()),
        session_id: SessionId::new(row.get::<_, String>("session_id")?),
        agent_id: AgentId::new(row.get::<_, String>("agent_id")?),
        event_type: event_type_from_str(&event_type_str).unwrap_or(sentinel_core::EventType::Custom),
        severity: severity_from_str(&severity_str).unwrap_or_default(),
        payload,
        metadata,
        prev_hash: row.get("prev_hash")?,
        hash: row.get("hash")?,
    })
}

fn parse_object(bytes: &[u8]) -> Option<Map<String, Value>> {
    match serde_json::from_slice::<Value>(bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn session_from_row(row: &rusqlite::Row<'_>, tenant_id: &str) -> Result<Session, SqliteStoreError> {
    let tags_bytes: Vec<u8> = row.get("tags_json")?;
    let tags: Vec<String> = serde_json::from_slice(&tags_bytes).map_err(|err| corrupt("tags_json", err))?;
    let status_str: String = row.get("status")?;
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    Ok(Session {
        id: SessionId::new(row.get::<_, String>("id")?),
        tenant_id: sentinel_core::TenantId::new(tenant_id.to_string()),
        agent_id: AgentId::new(row.get::<_, String>("agent_id")?),
        agent_name: row.get("agent_name")?,
        started_at: Instant::parse(&started_at).map_err(|_| SqliteStoreError::Corrupt("started_at".to_string()))?,
        ended_at: ended_at.map(|raw| Instant::parse(&raw)).transpose().map_err(|_| {
            SqliteStoreError::Corrupt("ended_at".to_string())
        })?,
        status: session_status_from_str(&status_str)?,
        event_count: row.get::<_, i64>("event_count")? as u64,
        tool_call_count: row.get::<_, i64>("tool_call_count")? as u64,
        error_count: row.get::<_, i64>("error_count")? as u64,
        llm_call_count: row.get::<_, i64>("llm_call_count")? as u64,
        tokens: TokenTotals {
            input_tokens: row.get::<_, i64>("input_tokens")? as u64,
            output_tokens: row.get::<_, i64>("output_tokens")? as u64,
        },
        cost_usd: row.get("cost_usd")?,
        tags,
    })
}

fn agent_from_row(row: &rusqlite::Row<'_>, tenant_id: &str) -> Result<AgentRecord, SqliteStoreError> {
    let first_seen: String = row.get("first_seen")?;
    let last_seen: String = row.get("last_seen")?;
    let paused_at: Option<String> = row.get("paused_at")?;
    Ok(AgentRecord {
        id: AgentId::new(row.get::<_, String>("id")?),
        tenant_id: sentinel_core::TenantId::new(tenant_id.to_string()),
        name: row.get("name")?,
        first_seen: Instant::parse(&first_seen).map_err(|_| SqliteStoreError::Corrupt("first_seen".to_string()))?,
        last_seen: Instant::parse(&last_seen).map_err(|_| SqliteStoreError::Corrupt("last_seen".to_string()))?,
        session_count: row.get::<_, i64>("session_count")? as u64,
        model_override: row.get("model_override")?,
        paused_at: paused_at.map(|raw| Instant::parse(&raw)).transpose().map_err(|_| {
            SqliteStoreError::Corrupt("paused_at".to_string())
        })?,
        pause_reason: row.get("pause_reason")?,
    })
}

fn embedding_from_row(row: &rusqlite::Row<'_>, tenant_id: &str) -> Result<Embedding, SqliteStoreError> {
    let source_type_str: String = row.get("source_type")?;
    let vector_bytes: Vec<u8> = row.get("vector")?;
    let created_at: String = row.get("created_at")?;
    Ok(Embedding {
        id: sentinel_core::EmbeddingId::new(row.get::<_, String>("id")?),
        tenant_id: sentinel_core::TenantId::new(tenant_id.to_string()),
        source_type: source_type_from_str(&source_type_str)?,
        source_id: row.get("source_id")?,
        content_hash: row.get("content_hash")?,
        text: row.get("text")?,
        vector: decode_vector(&vector_bytes),
        model: row.get("model")?,
        dimensions: row.get::<_, i64>("dimensions")? as u32,
        created_at: Instant::parse(&created_at).map_err(|_| SqliteStoreError::Corrupt("created_at".to_string()))?,
    })
}

// ============================================================================
// SECTION: Ingestion algorithm (§4.3)
// ============================================================================

impl SqliteStore {
    /// Implements the `insertEvents` algorithm of §4.3: per-session chain
    /// verification, atomic append, and session/agent projection update, all
    /// inside one transaction.
    fn insert_events_sync(&self, tenant_id: &str, events: Vec<Event>) -> Result<(), SqliteStoreError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut guard = self.lock()?;
        let tx = guard.transaction()?;

        let grouped = sentinel_core::partition_by_session(&events);
        for (session_id, session_events) in grouped {
            let mut prev_hash: Option<String> = tx
                .query_row(
                    "SELECT hash FROM events WHERE tenant_id = ?1 AND session_id = ?2 \
                     ORDER BY timestamp DESC LIMIT 1",
                    params![tenant_id, session_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            for event in session_events {
                if event.prev_hash != prev_hash {
                    return Err(SqliteStoreError::HashChain(format!(
                        "event {} expected prevHash {:?}, store has {:?}",
                        event.id, event.prev_hash, prev_hash
                    )));
                }
                if !event.hash_is_valid() {
                    return Err(SqliteStoreError::HashChain(format!("event {} hash does not match its fields", event.id)));
                }

                let existing: Option<String> = tx
                    .query_row(
                        "SELECT hash FROM events WHERE tenant_id = ?1 AND id = ?2",
                        params![tenant_id, event.id.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?;
                match existing {
                    Some(ref existing_hash) if existing_hash == &event.hash => {
                        prev_hash = Some(event.hash.clone());
                        continue;
                    }
                    Some(_) => {
                        return Err(SqliteStoreError::Conflict(format!(
                            "event {} already exists with different fields",
                            event.id
                        )));
                    }
                    None => {}
                }

                let payload_bytes =
                    serde_json::to_vec(&Value::Object(event.payload.clone())).map_err(|err| corrupt("payload", err))?;
                let metadata_bytes =
                    serde_json::to_vec(&Value::Object(event.metadata.clone())).map_err(|err| corrupt("metadata", err))?;
                tx.execute(
                    "INSERT INTO events (
                        tenant_id, id, session_id, agent_id, timestamp, event_type, severity,
                        payload_json, metadata_json, prev_hash, hash
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        tenant_id,
                        event.id.as_str(),
                        event.session_id.as_str(),
                        event.agent_id.as_str(),
                        event.timestamp.to_rfc3339(),
                        event_type_as_str(event.event_type),
                        severity_as_str(event.severity),
                        payload_bytes,
                        metadata_bytes,
                        event.prev_hash,
                        event.hash,
                    ],
                )?;

                apply_projection(&tx, tenant_id, event)?;
                prev_hash = Some(event.hash.clone());
            }
        }

        tx.commit()?;
        Ok(())
    }
}

/// Updates the session and agent projections for a single newly inserted
/// event (§4.3 step 4).
fn apply_projection(tx: &rusqlite::Transaction<'_>, tenant_id: &str, event: &Event) -> Result<(), SqliteStoreError> {
    let existing_session: Option<(String, i64, i64, i64, i64, i64, i64, f64, Vec<u8>, Option<String>, String)> = tx
        .query_row(
            "SELECT agent_name, event_count, tool_call_count, error_count, llm_call_count, \
             input_tokens, output_tokens, cost_usd, tags_json, ended_at, status \
             FROM sessions WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, event.session_id.as_str()],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                ))
            },
        )
        .optional()?;

    // New-session detection must happen before an agent's first event
    // lands: a session is "new" the first time its id is seen, regardless
    // of which event type arrives first (§4.3 "increment session count
    // when a new session id is seen").
    let is_new_session = existing_session.is_none();
    let (mut agent_name, mut event_count, mut tool_call_count, mut error_count, mut llm_call_count, mut input_tokens, mut output_tokens, mut cost_usd, tags_bytes, mut ended_at, mut status) =
        existing_session.unwrap_or_else(|| {
            (
                String::new(),
                0,
                0,
                0,
                0,
                0,
                0,
                0.0,
                b"[]".to_vec(),
                None,
                session_status_as_str(SessionStatus::Active).to_string(),
            )
        });
    let mut tags: Vec<String> = serde_json::from_slice(&tags_bytes).unwrap_or_default();

    event_count += 1;
    if event.event_type == sentinel_core::EventType::ToolCall {
        tool_call_count += 1;
    }
    if event.event_type == sentinel_core::EventType::LlmCall {
        llm_call_count += 1;
    }
    if event.counts_as_error() {
        error_count += 1;
    }
    if event.event_type == sentinel_core::EventType::LlmResponse {
        if let Some(usage) = event.payload.get("usage").and_then(Value::as_object) {
            input_tokens += usage.get("inputTokens").and_then(Value::as_i64).unwrap_or(0);
            output_tokens += usage.get("outputTokens").and_then(Value::as_i64).unwrap_or(0);
        }
    }
    if event.event_type == sentinel_core::EventType::CostTracked {
        if let Some(cost) = event.payload.get("costUsd").and_then(Value::as_f64) {
            cost_usd += cost;
        }
    }
    if event.event_type == sentinel_core::EventType::SessionStarted {
        if let Some(name) = event.payload.get("agentName").and_then(Value::as_str) {
            agent_name = name.to_string();
        }
        if let Some(Value::Array(raw_tags)) = event.payload.get("tags") {
            tags = raw_tags.iter().filter_map(Value::as_str).map(str::to_string).collect();
        }
    }
    if event.event_type == sentinel_core::EventType::SessionEnded {
        ended_at = Some(event.timestamp.to_rfc3339());
        status = if event.payload.get("reason").and_then(Value::as_str) == Some("error") {
            session_status_as_str(SessionStatus::Error).to_string()
        } else {
            session_status_as_str(SessionStatus::Completed).to_string()
        };
    }

    let tags_json = serde_json::to_vec(&tags).map_err(|err| corrupt("tags", err))?;
    let started_at = tx
        .query_row(
            "SELECT started_at FROM sessions WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, event.session_id.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .unwrap_or_else(|| event.timestamp.to_rfc3339());
    let agent_name_opt = if agent_name.is_empty() { None } else { Some(agent_name) };

    tx.execute(
        "INSERT INTO sessions (
            tenant_id, id, agent_id, agent_name, started_at, ended_at, status,
            event_count, tool_call_count, error_count, llm_call_count,
            input_tokens, output_tokens, cost_usd, tags_json
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT(tenant_id, id) DO UPDATE SET
            agent_name = excluded.agent_name,
            ended_at = excluded.ended_at,
            status = excluded.status,
            event_count = excluded.event_count,
            tool_call_count = excluded.tool_call_count,
            error_count = excluded.error_count,
            llm_call_count = excluded.llm_call_count,
            input_tokens = excluded.input_tokens,
            output_tokens = excluded.output_tokens,
            cost_usd = excluded.cost_usd,
            tags_json = excluded.tags_json",
        params![
            tenant_id,
            event.session_id.as_str(),
            event.agent_id.as_str(),
            agent_name_opt,
            started_at,
            ended_at,
            status,
            event_count,
            tool_call_count,
            error_count,
            llm_call_count,
            input_tokens,
            output_tokens,
            cost_usd,
            tags_json,
        ],
    )?;

    let agent_existing: Option<(String, i64)> = tx
        .query_row(
            "SELECT first_seen, session_count FROM agents WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, event.agent_id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match agent_existing {
        Some((first_seen, session_count)) => {
            let next_count = if is_new_session { session_count + 1 } else { session_count };
            tx.execute(
                "UPDATE agents SET last_seen = MAX(last_seen, ?1), session_count = ?2 WHERE tenant_id = ?3 AND id = ?4",
                params![event.timestamp.to_rfc3339(), next_count, tenant_id, event.agent_id.as_str()],
            )?;
            let _ = first_seen;
        }
        None => {
            tx.execute(
                "INSERT INTO agents (tenant_id, id, name, first_seen, last_seen, session_count, \
                 model_override, paused_at, pause_reason) VALUES (?1, ?2, NULL, ?3, ?3, 1, NULL, NULL, NULL)",
                params![tenant_id, event.agent_id.as_str(), event.timestamp.to_rfc3339()],
            )?;
        }
    }

    Ok(())
}

// ============================================================================
// SECTION: EventStore impl
// ============================================================================

#[async_trait]
impl EventStore for SqliteStore {
    fn capabilities(&self) -> StorageCapabilities {
        StorageCapabilities::embedded()
    }

    async fn insert_events(&self, scope: &TenantScope, events: Vec<Event>) -> Result<(), SentinelError> {
        self.insert_events_sync(scope.tenant_id().as_str(), events).map_err(Into::into)
    }

    async fn get_event(&self, scope: &TenantScope, id: &EventId) -> Result<Option<Event>, SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();
        let result = guard
            .query_row(
                "SELECT * FROM events WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, id.as_str()],
                |row| event_from_row(row, tenant_id),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        Ok(result)
    }

    async fn get_events_by_session(
        &self,
        scope: &TenantScope,
        session_id: &SessionId,
    ) -> Result<Vec<Event>, SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();
        let mut stmt = guard
            .prepare("SELECT * FROM events WHERE tenant_id = ?1 AND session_id = ?2 ORDER BY timestamp ASC")
            .map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map(params![tenant_id, session_id.as_str()], |row| event_from_row(row, tenant_id))
            .map_err(SqliteStoreError::from)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row.map_err(SqliteStoreError::from)?);
        }
        Ok(events)
    }

    async fn query_events(&self, scope: &TenantScope, filter: &EventFilter) -> Result<EventPage, SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();

        let mut clauses = vec!["tenant_id = ?1".to_string()];
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(tenant_id.to_string())];

        if let Some(event_type) = filter.event_type {
            args.push(Box::new(event_type_as_str(event_type).to_string()));
            clauses.push(format!("event_type = ?{}", args.len()));
        }
        if let Some(ref session_id) = filter.session_id {
            args.push(Box::new(session_id.as_str().to_string()));
            clauses.push(format!("session_id = ?{}", args.len()));
        }
        if let Some(ref agent_id) = filter.agent_id {
            args.push(Box::new(agent_id.as_str().to_string()));
            clauses.push(format!("agent_id = ?{}", args.len()));
        }
        if let Some(severity) = filter.severity {
            clauses.push(format!("{SEVERITY_RANK_CASE} >= {}", severity_rank(severity)));
        }
        if let Some(from) = filter.from {
            args.push(Box::new(from.to_rfc3339()));
            clauses.push(format!("timestamp >= ?{}", args.len()));
        }
        if let Some(to) = filter.to {
            args.push(Box::new(to.to_rfc3339()));
            clauses.push(format!("timestamp < ?{}", args.len()));
        }

        let where_clause = clauses.join(" AND ");
        let order_sql = match filter.order {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        };

        let count_sql = format!("SELECT COUNT(*) FROM events WHERE {where_clause}");
        let total: i64 = guard
            .query_row(&count_sql, rusqlite::params_from_iter(args.iter().map(std::convert::AsRef::as_ref)), |row| row.get(0))
            .map_err(SqliteStoreError::from)?;

        let limit = filter.effective_limit();
        let offset = filter.effective_offset();
        let query_sql = format!(
            "SELECT * FROM events WHERE {where_clause} ORDER BY timestamp {order_sql} LIMIT {limit} OFFSET {offset}"
        );
        let mut stmt = guard.prepare(&query_sql).map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter().map(std::convert::AsRef::as_ref)), |row| {
                event_from_row(row, tenant_id)
            })
            .map_err(SqliteStoreError::from)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row.map_err(SqliteStoreError::from)?);
        }

        let has_more = u64::from(offset) + (events.len() as u64) < total as u64;
        Ok(EventPage { events, total: total as u64, has_more })
    }

    async fn get_session(&self, scope: &TenantScope, id: &SessionId) -> Result<Option<Session>, SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();
        let row = guard
            .query_row(
                "SELECT * FROM sessions WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, id.as_str()],
                |row| session_from_row(row, tenant_id).map_err(wrap_conversion_error),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        Ok(row)
    }

    async fn upsert_session(&self, scope: &TenantScope, session: Session) -> Result<(), SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();
        let tags_json = serde_json::to_vec(&session.tags).map_err(|err| corrupt("tags", err))?;
        guard
            .execute(
                "INSERT INTO sessions (
                    tenant_id, id, agent_id, agent_name, started_at, ended_at, status,
                    event_count, tool_call_count, error_count, llm_call_count,
                    input_tokens, output_tokens, cost_usd, tags_json
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(tenant_id, id) DO UPDATE SET
                    agent_id = excluded.agent_id, agent_name = excluded.agent_name,
                    started_at = excluded.started_at, ended_at = excluded.ended_at,
                    status = excluded.status, event_count = excluded.event_count,
                    tool_call_count = excluded.tool_call_count, error_count = excluded.error_count,
                    llm_call_count = excluded.llm_call_count, input_tokens = excluded.input_tokens,
                    output_tokens = excluded.output_tokens, cost_usd = excluded.cost_usd,
                    tags_json = excluded.tags_json",
                params![
                    tenant_id,
                    session.id.as_str(),
                    session.agent_id.as_str(),
                    session.agent_name,
                    session.started_at.to_rfc3339(),
                    session.ended_at.map(|instant| instant.to_rfc3339()),
                    session_status_as_str(session.status),
                    session.event_count as i64,
                    session.tool_call_count as i64,
                    session.error_count as i64,
                    session.llm_call_count as i64,
                    session.tokens.input_tokens as i64,
                    session.tokens.output_tokens as i64,
                    session.cost_usd,
                    tags_json,
                ],
            )
            .map_err(SqliteStoreError::from)?;
        Ok(())
    }

    async fn get_sessions(&self, scope: &TenantScope, filter: &SessionFilter) -> Result<Vec<Session>, SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();
        let (where_clause, args) = session_filter_sql(tenant_id, filter);
        let limit = filter.effective_limit();
        let offset = filter.offset.unwrap_or(0);
        let sql = format!(
            "SELECT * FROM sessions WHERE {where_clause} ORDER BY started_at ASC LIMIT {limit} OFFSET {offset}"
        );
        let mut stmt = guard.prepare(&sql).map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter().map(std::convert::AsRef::as_ref)), |row| {
                session_from_row(row, tenant_id).map_err(wrap_conversion_error)
            })
            .map_err(SqliteStoreError::from)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row.map_err(SqliteStoreError::from)?);
        }
        Ok(sessions)
    }

    async fn count_sessions(&self, scope: &TenantScope, filter: &SessionFilter) -> Result<u64, SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();
        let (where_clause, args) = session_filter_sql(tenant_id, filter);
        let sql = format!("SELECT COUNT(*) FROM sessions WHERE {where_clause}");
        let total: i64 = guard
            .query_row(&sql, rusqlite::params_from_iter(args.iter().map(std::convert::AsRef::as_ref)), |row| row.get(0))
            .map_err(SqliteStoreError::from)?;
        Ok(total as u64)
    }

    async fn get_agent(&self, scope: &TenantScope, id: &AgentId) -> Result<Option<AgentRecord>, SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();
        let row = guard
            .query_row(
                "SELECT * FROM agents WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, id.as_str()],
                |row| agent_from_row(row, tenant_id).map_err(wrap_conversion_error),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        Ok(row)
    }

    async fn upsert_agent(&self, scope: &TenantScope, agent: AgentRecord) -> Result<(), SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();
        guard
            .execute(
                "INSERT INTO agents (
                    tenant_id, id, name, first_seen, last_seen, session_count,
                    model_override, paused_at, pause_reason
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(tenant_id, id) DO UPDATE SET
                    name = excluded.name, last_seen = excluded.last_seen,
                    session_count = excluded.session_count, model_override = excluded.model_override,
                    paused_at = excluded.paused_at, pause_reason = excluded.pause_reason",
                params![
                    tenant_id,
                    agent.id.as_str(),
                    agent.name,
                    agent.first_seen.to_rfc3339(),
                    agent.last_seen.to_rfc3339(),
                    agent.session_count as i64,
                    agent.model_override,
                    agent.paused_at.map(|instant| instant.to_rfc3339()),
                    agent.pause_reason,
                ],
            )
            .map_err(SqliteStoreError::from)?;
        Ok(())
    }

    async fn get_agents(&self, scope: &TenantScope) -> Result<Vec<AgentRecord>, SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();
        let mut stmt =
            guard.prepare("SELECT * FROM agents WHERE tenant_id = ?1 ORDER BY first_seen ASC").map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map(params![tenant_id], |row| agent_from_row(row, tenant_id).map_err(wrap_conversion_error))
            .map_err(SqliteStoreError::from)?;
        let mut agents = Vec::new();
        for row in rows {
            agents.push(row.map_err(SqliteStoreError::from)?);
        }
        Ok(agents)
    }

    async fn get_stats(&self, scope: &TenantScope) -> Result<StoreStats, SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();
        let total_events: i64 = guard
            .query_row("SELECT COUNT(*) FROM events WHERE tenant_id = ?1", params![tenant_id], |row| row.get(0))
            .map_err(SqliteStoreError::from)?;
        let total_sessions: i64 = guard
            .query_row("SELECT COUNT(*) FROM sessions WHERE tenant_id = ?1", params![tenant_id], |row| row.get(0))
            .map_err(SqliteStoreError::from)?;
        let total_agents: i64 = guard
            .query_row("SELECT COUNT(*) FROM agents WHERE tenant_id = ?1", params![tenant_id], |row| row.get(0))
            .map_err(SqliteStoreError::from)?;
        Ok(StoreStats {
            total_events: total_events as u64,
            total_sessions: total_sessions as u64,
            total_agents: total_agents as u64,
        })
    }

    async fn apply_retention(&self, scope: &TenantScope, cutoff: Instant) -> Result<RetentionOutcome, SentinelError> {
        let mut guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();
        let tx = guard.transaction().map_err(SqliteStoreError::from)?;
        let deleted = tx
            .execute(
                "DELETE FROM events WHERE tenant_id = ?1 AND timestamp < ?2",
                params![tenant_id, cutoff.to_rfc3339()],
            )
            .map_err(SqliteStoreError::from)?;
        tx.execute(
            "DELETE FROM sessions WHERE tenant_id = ?1 AND id NOT IN \
             (SELECT DISTINCT session_id FROM events WHERE tenant_id = ?1)",
            params![tenant_id],
        )
        .map_err(SqliteStoreError::from)?;
        tx.commit().map_err(SqliteStoreError::from)?;
        Ok(RetentionOutcome { deleted_count: deleted as u64, skipped: false })
    }

    async fn expiring_row_count(
        &self,
        scope: &TenantScope,
        now: Instant,
        retention_days: u32,
        lead_days: u32,
    ) -> Result<ExpiryWarning, SentinelError> {
        count_expiring(self, scope, now, retention_days, lead_days)
    }
}

/// Counts rows that will expire within `lead_days` of `now`, for use by the
/// retention purger's approaching-expiry warning (§4.9, §3 supplement).
///
/// # Errors
///
/// Returns [`SentinelError::Unavailable`] on a transient backend fault.
pub fn count_expiring(
    store: &SqliteStore,
    scope: &TenantScope,
    now: Instant,
    retention_days: u32,
    lead_days: u32,
) -> Result<ExpiryWarning, SentinelError> {
    let guard = store.lock()?;
    let tenant_id = scope.tenant_id().as_str();
    let retention_secs = i64::from(retention_days) * 86_400;
    let lead_secs = i64::from(lead_days) * 86_400;
    let cutoff = now.as_utc() - chrono::Duration::seconds(retention_secs - lead_secs);
    let cutoff_str = Instant::from_utc(cutoff).to_rfc3339();
    let rows: i64 = guard
        .query_row(
            "SELECT COUNT(*) FROM events WHERE tenant_id = ?1 AND timestamp < ?2",
            params![tenant_id, cutoff_str],
            |row| row.get(0),
        )
        .map_err(SqliteStoreError::from)?;
    Ok(ExpiryWarning { tenant_id: scope.tenant_id().clone(), rows_expiring: rows as u64, lead_days })
}

fn session_filter_sql(tenant_id: &str, filter: &SessionFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
    let mut clauses = vec!["tenant_id = ?1".to_string()];
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(tenant_id.to_string())];
    if let Some(ref agent_id) = filter.agent_id {
        args.push(Box::new(agent_id.as_str().to_string()));
        clauses.push(format!("agent_id = ?{}", args.len()));
    }
    if let Some(status) = filter.status {
        args.push(Box::new(session_status_as_str(status).to_string()));
        clauses.push(format!("status = ?{}", args.len()));
    }
    if let Some(from) = filter.from {
        args.push(Box::new(from.to_rfc3339()));
        clauses.push(format!("started_at >= ?{}", args.len()));
    }
    if let Some(to) = filter.to {
        args.push(Box::new(to.to_rfc3339()));
        clauses.push(format!("started_at < ?{}", args.len()));
    }
    (clauses.join(" AND "), args)
}

/// Wraps a [`SqliteStoreError`] produced inside a `rusqlite` row-mapping
/// closure so it survives the round trip through `rusqlite::Error`.
fn wrap_conversion_error(error: SqliteStoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(error))
}

// ============================================================================
// SECTION: EmbeddingStore impl (in-memory fallback similarity search, §4.4)
// ============================================================================

#[async_trait]
impl EmbeddingStore for SqliteStore {
    fn capabilities(&self) -> StorageCapabilities {
        StorageCapabilities::embedded()
    }

    async fn store(&self, scope: &TenantScope, embedding: Embedding) -> Result<(), SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();
        let vector_bytes = encode_vector(&embedding.vector);
        guard
            .execute(
                "INSERT INTO embeddings (
                    tenant_id, id, source_type, source_id, content_hash, text, vector, model,
                    dimensions, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(tenant_id, source_type, source_id) DO UPDATE SET
                    id = excluded.id, content_hash = excluded.content_hash, text = excluded.text,
                    vector = excluded.vector, model = excluded.model, dimensions = excluded.dimensions,
                    created_at = excluded.created_at",
                params![
                    tenant_id,
                    embedding.id.as_str(),
                    source_type_as_str(embedding.source_type),
                    embedding.source_id,
                    embedding.content_hash,
                    embedding.text,
                    vector_bytes,
                    embedding.model,
                    embedding.dimensions as i64,
                    embedding.created_at.to_rfc3339(),
                ],
            )
            .map_err(SqliteStoreError::from)?;
        Ok(())
    }

    async fn delete(&self, scope: &TenantScope, source_type: SourceType, source_id: &str) -> Result<(), SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();
        guard
            .execute(
                "DELETE FROM embeddings WHERE tenant_id = ?1 AND source_type = ?2 AND source_id = ?3",
                params![tenant_id, source_type_as_str(source_type), source_id],
            )
            .map_err(SqliteStoreError::from)?;
        Ok(())
    }

    async fn similarity_search(
        &self,
        scope: &TenantScope,
        query_vector: &[f32],
        filter: &SimilarityFilter,
    ) -> Result<Vec<SimilarityMatch>, SentinelError> {
        let guard = self.lock()?;
        let tenant_id = scope.tenant_id().as_str();

        let mut clauses = vec!["tenant_id = ?1".to_string()];
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(tenant_id.to_string())];
        if let Some(source_type) = filter.source_type {
            args.push(Box::new(source_type_as_str(source_type).to_string()));
            clauses.push(format!("source_type = ?{}", args.len()));
        }
        if let Some(from) = filter.from {
            args.push(Box::new(from.to_rfc3339()));
            clauses.push(format!("created_at >= ?{}", args.len()));
        }
        if let Some(to) = filter.to {
            args.push(Box::new(to.to_rfc3339()));
            clauses.push(format!("created_at < ?{}", args.len()));
        }
        let where_clause = clauses.join(" AND ");
        let sql = format!("SELECT * FROM embeddings WHERE {where_clause} LIMIT {}", SIMILARITY_CANDIDATE_CAP + 1);
        let mut stmt = guard.prepare(&sql).map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter().map(std::convert::AsRef::as_ref)), |row| {
                embedding_from_row(row, tenant_id).map_err(wrap_conversion_error)
            })
            .map_err(SqliteStoreError::from)?;

        let min_score = filter.effective_min_score();
        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row.map_err(SqliteStoreError::from)?);
        }
        if candidates.len() > SIMILARITY_CANDIDATE_CAP {
            candidates.truncate(SIMILARITY_CANDIDATE_CAP);
            tracing::warn!(
                tenant_id, candidate_cap = SIMILARITY_CANDIDATE_CAP,
                "similarity search candidate cap reached; result may be incomplete"
            );
        }
        let mut matches = Vec::new();
        for embedding in candidates {
            let score = cosine_similarity(query_vector, &embedding.vector);
            if score >= min_score {
                matches.push(SimilarityMatch { embedding, score });
            }
        }
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let limit = usize::try_from(filter.effective_limit()).unwrap_or(usize::MAX);
        matches.truncate(limit);
        Ok(matches)
    }
}

