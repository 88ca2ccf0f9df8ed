// sentinel-store-sqlite/src/schema.rs
// ============================================================================
// Module: SQLite Schema
// Description: DDL for the embedded backend's persisted layout (§6
// "Persisted layout").
// Purpose: Keep table/index definitions in one place, applied once at
// connection open time.
// Dependencies: rusqlite
// ============================================================================

use rusqlite::Connection;

/// Schema version stamped into `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Applies the embedded backend's schema, creating tables and indexes if
/// they do not already exist.
///
/// # Errors
///
/// Returns a [`rusqlite::Error`] when any DDL statement fails.
pub fn initialize(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS events (
            tenant_id   TEXT NOT NULL,
            id          TEXT NOT NULL,
            session_id  TEXT NOT NULL,
            agent_id    TEXT NOT NULL,
            timestamp   TEXT NOT NULL,
            event_type  TEXT NOT NULL,
            severity    TEXT NOT NULL,
            payload_json  BLOB NOT NULL,
            metadata_json BLOB NOT NULL,
            prev_hash   TEXT,
            hash        TEXT NOT NULL,
            PRIMARY KEY (tenant_id, id)
        );
        CREATE INDEX IF NOT EXISTS idx_events_session
            ON events (tenant_id, session_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_events_tenant_time
            ON events (tenant_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_events_tenant_type
            ON events (tenant_id, event_type, timestamp);

        CREATE TABLE IF NOT EXISTS sessions (
            tenant_id        TEXT NOT NULL,
            id               TEXT NOT NULL,
            agent_id         TEXT NOT NULL,
            agent_name       TEXT,
            started_at       TEXT NOT NULL,
            ended_at         TEXT,
            status           TEXT NOT NULL,
            event_count      INTEGER NOT NULL,
            tool_call_count  INTEGER NOT NULL,
            error_count      INTEGER NOT NULL,
            llm_call_count   INTEGER NOT NULL,
            input_tokens     INTEGER NOT NULL,
            output_tokens    INTEGER NOT NULL,
            cost_usd         REAL NOT NULL,
            tags_json        BLOB NOT NULL,
            PRIMARY KEY (tenant_id, id)
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_tenant_started
            ON sessions (tenant_id, started_at);
        CREATE INDEX IF NOT EXISTS idx_sessions_tenant_agent
            ON sessions (tenant_id, agent_id);

        CREATE TABLE IF NOT EXISTS agents (
            tenant_id       TEXT NOT NULL,
            id              TEXT NOT NULL,
            name            TEXT,
            first_seen      TEXT NOT NULL,
            last_seen       TEXT NOT NULL,
            session_count   INTEGER NOT NULL,
            model_override  TEXT,
            paused_at       TEXT,
            pause_reason    TEXT,
            PRIMARY KEY (tenant_id, id)
        );

        CREATE TABLE IF NOT EXISTS embeddings (
            tenant_id     TEXT NOT NULL,
            id            TEXT NOT NULL,
            source_type   TEXT NOT NULL,
            source_id     TEXT NOT NULL,
            content_hash  TEXT NOT NULL,
            text          TEXT NOT NULL,
            vector        BLOB NOT NULL,
            model         TEXT NOT NULL,
            dimensions    INTEGER NOT NULL,
            created_at    TEXT NOT NULL,
            PRIMARY KEY (tenant_id, id)
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_embeddings_source
            ON embeddings (tenant_id, source_type, source_id);

        CREATE TABLE IF NOT EXISTS api_keys (
            tenant_id     TEXT NOT NULL,
            id            TEXT NOT NULL,
            prefix        TEXT NOT NULL,
            secret_hash   TEXT NOT NULL,
            name          TEXT NOT NULL,
            scopes_json   BLOB NOT NULL,
            environment   TEXT NOT NULL,
            created_at    TEXT NOT NULL,
            last_used_at  TEXT,
            revoked_at    TEXT,
            PRIMARY KEY (tenant_id, id)
        );
        CREATE INDEX IF NOT EXISTS idx_api_keys_prefix ON api_keys (prefix);

        CREATE TABLE IF NOT EXISTS guardrail_rules (
            tenant_id       TEXT NOT NULL,
            id              TEXT NOT NULL,
            name            TEXT NOT NULL,
            enabled         INTEGER NOT NULL,
            agent_id        TEXT,
            condition_json  BLOB NOT NULL,
            actions_json    BLOB NOT NULL,
            cooldown_secs   INTEGER NOT NULL,
            dry_run         INTEGER NOT NULL,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            PRIMARY KEY (tenant_id, id)
        );

        CREATE TABLE IF NOT EXISTS guardrail_state (
            tenant_id         TEXT NOT NULL,
            rule_id           TEXT NOT NULL,
            agent_id          TEXT NOT NULL,
            last_triggered_at TEXT,
            trigger_count     INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (tenant_id, rule_id, agent_id)
        );

        CREATE TABLE IF NOT EXISTS guardrail_trigger_history (
            tenant_id    TEXT NOT NULL,
            id           TEXT NOT NULL,
            rule_id      TEXT NOT NULL,
            triggered_at TEXT NOT NULL,
            session_id   TEXT,
            agent_id     TEXT,
            detail_json  BLOB NOT NULL,
            dry_run      INTEGER NOT NULL,
            PRIMARY KEY (tenant_id, id)
        );
        CREATE INDEX IF NOT EXISTS idx_trigger_history_rule
            ON guardrail_trigger_history (tenant_id, rule_id, triggered_at);
        ",
    )?;
    connection.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}
