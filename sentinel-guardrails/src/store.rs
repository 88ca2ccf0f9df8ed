// sentinel-guardrails/src/store.rs
// ============================================================================
// Module: Guardrail Table Access
// Description: Raw `SQLite` access to the `guardrail_rules`,
// `guardrail_state`, and `guardrail_trigger_history` tables, which sit
// outside the storage-agnostic `sentinel_contract` traits (§4.6, §6
// "Persisted layout").
// Dependencies: rusqlite, sentinel-core
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use sentinel_core::AgentId;
use sentinel_core::GuardrailRuleId;
use sentinel_core::Instant;
use sentinel_core::TenantId;
use sentinel_core::TriggerHistoryId;
use sentinel_core::generate_sortable_id;
use thiserror::Error;

use crate::rule::Action;
use crate::rule::Condition;
use crate::rule::GuardrailRule;

/// Errors raised while reading or writing guardrail tables.
#[derive(Debug, Error)]
pub enum GuardrailStoreError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Db(#[from] rusqlite::Error),
    /// A persisted row failed to decode back into domain types.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Thin wrapper over the shared `SQLite` connection, scoped to guardrail
/// tables.
#[derive(Clone)]
pub struct GuardrailStore {
    /// Shared handle obtained from [`sentinel_store_sqlite::SqliteStore`].
    connection: Arc<Mutex<Connection>>,
}

impl GuardrailStore {
    /// Wraps an existing connection handle.
    #[must_use]
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, GuardrailStoreError> {
        self.connection.lock().map_err(|_| GuardrailStoreError::Corrupt("connection mutex poisoned".to_string()))
    }

    /// Distinct tenants that have at least one guardrail rule.
    pub fn list_tenant_ids(&self) -> Result<Vec<TenantId>, GuardrailStoreError> {
        let connection = self.lock()?;
        let mut statement = connection.prepare("SELECT DISTINCT tenant_id FROM guardrail_rules")?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
        let mut tenants = Vec::new();
        for row in rows {
            tenants.push(TenantId::new(row?));
        }
        Ok(tenants)
    }

    /// Every enabled rule for `tenant_id`.
    pub fn list_enabled_rules(&self, tenant_id: &TenantId) -> Result<Vec<GuardrailRule>, GuardrailStoreError> {
        let connection = self.lock()?;
        let mut statement = connection.prepare(
            "SELECT tenant_id, id, name, enabled, agent_id, condition_json, actions_json, cooldown_secs, \
             dry_run, created_at, updated_at FROM guardrail_rules WHERE tenant_id = ?1 AND enabled = 1",
        )?;
        let rows = statement.query_map(params![tenant_id.as_str()], row_to_rule)?;
        let mut rules = Vec::new();
        for row in rows {
            rules.push(row?);
        }
        Ok(rules)
    }

    /// Every rule for `tenant_id`, enabled or not (§6 `GET /api/guardrails`).
    pub fn list_rules(&self, tenant_id: &TenantId) -> Result<Vec<GuardrailRule>, GuardrailStoreError> {
        let connection = self.lock()?;
        let mut statement = connection.prepare(
            "SELECT tenant_id, id, name, enabled, agent_id, condition_json, actions_json, cooldown_secs, \
             dry_run, created_at, updated_at FROM guardrail_rules WHERE tenant_id = ?1 ORDER BY created_at",
        )?;
        let rows = statement.query_map(params![tenant_id.as_str()], row_to_rule)?;
        let mut rules = Vec::new();
        for row in rows {
            rules.push(row?);
        }
        Ok(rules)
    }

    /// A single rule by id (§6 `GET /api/guardrails/:id`).
    pub fn get_rule(&self, tenant_id: &TenantId, rule_id: &GuardrailRuleId) -> Result<Option<GuardrailRule>, GuardrailStoreError> {
        let connection = self.lock()?;
        connection
            .query_row(
                "SELECT tenant_id, id, name, enabled, agent_id, condition_json, actions_json, cooldown_secs, \
                 dry_run, created_at, updated_at FROM guardrail_rules WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id.as_str(), rule_id.as_str()],
                row_to_rule,
            )
            .optional()
            .map_err(GuardrailStoreError::from)
    }

    /// Inserts a new rule, or replaces an existing one with the same id
    /// (§6 `POST /api/guardrails`, `PUT /api/guardrails/:id`).
    pub fn put_rule(&self, rule: &GuardrailRule) -> Result<(), GuardrailStoreError> {
        let condition_json = serde_json::to_vec(&rule.condition).map_err(|err| GuardrailStoreError::Corrupt(err.to_string()))?;
        let actions_json = serde_json::to_vec(&rule.actions).map_err(|err| GuardrailStoreError::Corrupt(err.to_string()))?;
        let connection = self.lock()?;
        connection.execute(
            "INSERT INTO guardrail_rules \
             (tenant_id, id, name, enabled, agent_id, condition_json, actions_json, cooldown_secs, dry_run, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT (tenant_id, id) DO UPDATE SET \
             name = excluded.name, enabled = excluded.enabled, agent_id = excluded.agent_id, \
             condition_json = excluded.condition_json, actions_json = excluded.actions_json, \
             cooldown_secs = excluded.cooldown_secs, dry_run = excluded.dry_run, updated_at = excluded.updated_at",
            params![
                rule.tenant_id.as_str(),
                rule.id.as_str(),
                rule.name,
                i64::from(rule.enabled),
                rule.agent_id.as_ref().map(sentinel_core::AgentId::as_str),
                condition_json,
                actions_json,
                i64::try_from(rule.cooldown_secs).unwrap_or(i64::MAX),
                i64::from(rule.dry_run),
                rule.created_at.to_rfc3339(),
                rule.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Deletes a rule and its per-agent state (§6 `DELETE /api/guardrails/:id`).
    pub fn delete_rule(&self, tenant_id: &TenantId, rule_id: &GuardrailRuleId) -> Result<(), GuardrailStoreError> {
        let connection = self.lock()?;
        connection.execute(
            "DELETE FROM guardrail_rules WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id.as_str(), rule_id.as_str()],
        )?;
        connection.execute(
            "DELETE FROM guardrail_state WHERE tenant_id = ?1 AND rule_id = ?2",
            params![tenant_id.as_str(), rule_id.as_str()],
        )?;
        Ok(())
    }

    /// Trigger history for a tenant, most recent first, optionally scoped to
    /// one rule (§6 `GET /api/guardrails/history`).
    pub fn trigger_history(
        &self,
        tenant_id: &TenantId,
        rule_id: Option<&GuardrailRuleId>,
        limit: u32,
    ) -> Result<Vec<TriggerHistoryRecord>, GuardrailStoreError> {
        let connection = self.lock()?;
        let mut statement = connection.prepare(
            "SELECT id, rule_id, triggered_at, session_id, agent_id, detail_json, dry_run FROM guardrail_trigger_history \
             WHERE tenant_id = ?1 AND (?2 IS NULL OR rule_id = ?2) ORDER BY triggered_at DESC LIMIT ?3",
        )?;
        let rows = statement.query_map(
            params![tenant_id.as_str(), rule_id.map(GuardrailRuleId::as_str), i64::from(limit)],
            row_to_trigger_history,
        )?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Last time `rule_id` fired for `agent_id`, and how many times total.
    pub fn rule_state(
        &self,
        tenant_id: &TenantId,
        rule_id: &GuardrailRuleId,
        agent_id: &AgentId,
    ) -> Result<(Option<Instant>, u64), GuardrailStoreError> {
        let connection = self.lock()?;
        let row: Option<(Option<String>, i64)> = connection
            .query_row(
                "SELECT last_triggered_at, trigger_count FROM guardrail_state \
                 WHERE tenant_id = ?1 AND rule_id = ?2 AND agent_id = ?3",
                params![tenant_id.as_str(), rule_id.as_str(), agent_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((last_triggered_at, trigger_count)) = row else {
            return Ok((None, 0));
        };
        let last_triggered_at =
            last_triggered_at.map(|text| Instant::parse(&text)).transpose().map_err(|err| GuardrailStoreError::Corrupt(err.to_string()))?;
        let trigger_count = u64::try_from(trigger_count).unwrap_or(0);
        Ok((last_triggered_at, trigger_count))
    }

    /// Records a firing: bumps `guardrail_state` and inserts a
    /// `guardrail_trigger_history` row.
    pub fn record_trigger(
        &self,
        tenant_id: &TenantId,
        rule_id: &GuardrailRuleId,
        agent_id: &AgentId,
        session_id: Option<&str>,
        triggered_at: &Instant,
        detail: &serde_json::Value,
        dry_run: bool,
    ) -> Result<TriggerHistoryId, GuardrailStoreError> {
        let now_millis = u64::try_from(triggered_at.as_utc().timestamp_millis()).unwrap_or(0);
        let history_id = TriggerHistoryId::new(generate_sortable_id(now_millis));
        let detail_json = serde_json::to_vec(detail).map_err(|err| GuardrailStoreError::Corrupt(err.to_string()))?;

        let connection = self.lock()?;
        connection.execute(
            "INSERT INTO guardrail_state (tenant_id, rule_id, agent_id, last_triggered_at, trigger_count) \
             VALUES (?1, ?2, ?3, ?4, 1) \
             ON CONFLICT (tenant_id, rule_id, agent_id) DO UPDATE SET \
             last_triggered_at = excluded.last_triggered_at, trigger_count = trigger_count + 1",
            params![tenant_id.as_str(), rule_id.as_str(), agent_id.as_str(), triggered_at.to_rfc3339()],
        )?;
        connection.execute(
            "INSERT INTO guardrail_trigger_history \
             (tenant_id, id, rule_id, triggered_at, session_id, agent_id, detail_json, dry_run) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                tenant_id.as_str(),
                history_id.as_str(),
                rule_id.as_str(),
                triggered_at.to_rfc3339(),
                session_id,
                agent_id.as_str(),
                detail_json,
                i64::from(dry_run),
            ],
        )?;
        Ok(history_id)
    }
}

/// Wraps a conversion failure so it can escape a `query_map` closure, which
/// is constrained to return [`rusqlite::Error`].
fn conversion_failure(column: usize, error: impl std::fmt::Display) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, error.to_string().into())
}

/// Decodes one `guardrail_rules` row into a [`GuardrailRule`].
fn row_to_rule(row: &rusqlite::Row<'_>) -> rusqlite::Result<GuardrailRule> {
    let condition_json: Vec<u8> = row.get(5)?;
    let actions_json: Vec<u8> = row.get(6)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    let condition: Condition =
        serde_json::from_slice(&condition_json).map_err(|err| conversion_failure(5, err))?;
    let actions: Vec<Action> =
        serde_json::from_slice(&actions_json).map_err(|err| conversion_failure(6, err))?;
    let created_at = Instant::parse(&created_at).map_err(|err| conversion_failure(9, err))?;
    let updated_at = Instant::parse(&updated_at).map_err(|err| conversion_failure(10, err))?;

    Ok(GuardrailRule {
        tenant_id: TenantId::new(row.get::<_, String>(0)?),
        id: GuardrailRuleId::new(row.get::<_, String>(1)?),
        name: row.get(2)?,
        enabled: row.get::<_, i64>(3)? != 0,
        agent_id: row.get::<_, Option<String>>(4)?.map(AgentId::new),
        condition,
        actions,
        cooldown_secs: u64::try_from(row.get::<_, i64>(7)?).unwrap_or(0),
        dry_run: row.get::<_, i64>(8)? != 0,
        created_at,
        updated_at,
    })
}

/// One row returned by [`GuardrailStore::trigger_history`] (§6 `GET
/// /api/guardrails/history`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct TriggerHistoryRecord {
    /// Identifier of this history record.
    pub id: TriggerHistoryId,
    /// Rule that fired.
    pub rule_id: GuardrailRuleId,
    /// Instant the rule fired.
    pub triggered_at: Instant,
    /// Session active for the agent at the time, if known.
    pub session_id: Option<String>,
    /// Agent the rule fired against.
    pub agent_id: Option<AgentId>,
    /// Observed value, threshold, and whether the action executed.
    pub detail: serde_json::Value,
    /// Whether this firing was a dry run (no action dispatched).
    pub dry_run: bool,
}

/// Decodes one `guardrail_trigger_history` row into a
/// [`TriggerHistoryRecord`].
fn row_to_trigger_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<TriggerHistoryRecord> {
    let triggered_at: String = row.get(2)?;
    let detail_json: Vec<u8> = row.get(5)?;
    Ok(TriggerHistoryRecord {
        id: TriggerHistoryId::new(row.get::<_, String>(0)?),
        rule_id: GuardrailRuleId::new(row.get::<_, String>(1)?),
        triggered_at: Instant::parse(&triggered_at).map_err(|err| conversion_failure(2, err))?,
        session_id: row.get(3)?,
        agent_id: row.get::<_, Option<String>>(4)?.map(AgentId::new),
        detail: serde_json::from_slice(&detail_json).map_err(|err| conversion_failure(5, err))?,
        dry_run: row.get::<_, i64>(6)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::CostScope;

    fn test_store() -> GuardrailStore {
        let config = sentinel_store_sqlite::SqliteStoreConfig::in_memory();
        let sqlite_store = sentinel_store_sqlite::SqliteStore::open(&config).expect("open in-memory sqlite");
        GuardrailStore::new(sqlite_store.connection_handle())
    }

    fn sample_rule(tenant: &str, id: &str) -> GuardrailRule {
        let now = Instant::now();
        GuardrailRule {
            tenant_id: TenantId::new(tenant),
            id: GuardrailRuleId::new(id),
            name: "cost guard".to_string(),
            enabled: true,
            agent_id: None,
            condition: Condition::CostLimit { scope: CostScope::Daily, max_cost_usd: 5.0 },
            actions: vec![Action::PauseAgent],
            cooldown_secs: 300,
            dry_run: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn put_then_get_round_trips_a_rule() {
        let store = test_store();
        let rule = sample_rule("acme", "rule-1");
        store.put_rule(&rule).expect("put");
        let fetched = store.get_rule(&rule.tenant_id, &rule.id).expect("get").expect("present");
        assert_eq!(fetched.name, rule.name);
        assert_eq!(fetched.cooldown_secs, rule.cooldown_secs);
    }

    #[test]
    fn put_rule_twice_updates_rather_than_duplicates() {
        let store = test_store();
        let mut rule = sample_rule("acme", "rule-1");
        store.put_rule(&rule).expect("put");
        rule.name = "renamed".to_string();
        store.put_rule(&rule).expect("put again");
        let rules = store.list_rules(&rule.tenant_id).expect("list");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "renamed");
    }

    #[test]
    fn delete_rule_removes_it_and_its_state() {
        let store = test_store();
        let rule = sample_rule("acme", "rule-1");
        store.put_rule(&rule).expect("put");
        store
            .record_trigger(&rule.tenant_id, &rule.id, &AgentId::new("agent-1"), None, &rule.created_at, &serde_json::json!({}), false)
            .expect("record trigger");
        store.delete_rule(&rule.tenant_id, &rule.id).expect("delete");
        assert!(store.get_rule(&rule.tenant_id, &rule.id).expect("get").is_none());
        let (last, count) = store.rule_state(&rule.tenant_id, &rule.id, &AgentId::new("agent-1")).expect("state");
        assert!(last.is_none());
        assert_eq!(count, 0);
    }

    #[test]
    fn list_enabled_rules_excludes_disabled_ones() {
        let store = test_store();
        let enabled = sample_rule("acme", "rule-1");
        let mut disabled = sample_rule("acme", "rule-2");
        disabled.enabled = false;
        store.put_rule(&enabled).expect("put enabled");
        store.put_rule(&disabled).expect("put disabled");
        let rules = store.list_enabled_rules(&enabled.tenant_id).expect("list");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, enabled.id);
    }

    #[test]
    fn record_trigger_accumulates_history_and_bumps_count() {
        let store = test_store();
        let rule = sample_rule("acme", "rule-1");
        store.put_rule(&rule).expect("put");
        let agent_id = AgentId::new("agent-1");
        store.record_trigger(&rule.tenant_id, &rule.id, &agent_id, None, &rule.created_at, &serde_json::json!({"x": 1}), false).expect("first");
        store.record_trigger(&rule.tenant_id, &rule.id, &agent_id, None, &rule.created_at, &serde_json::json!({"x": 2}), false).expect("second");
        let (_last, count) = store.rule_state(&rule.tenant_id, &rule.id, &agent_id).expect("state");
        assert_eq!(count, 2);
        let history = store.trigger_history(&rule.tenant_id, Some(&rule.id), 10).expect("history");
        assert_eq!(history.len(), 2);
    }
}
