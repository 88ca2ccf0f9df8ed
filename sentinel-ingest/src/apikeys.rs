// sentinel-ingest/src/apikeys.rs
// ============================================================================
// Module: API Key Table Access
// Description: Raw `SQLite` access to the `api_keys` table (§6 "Persisted
// layout"), which sits outside the storage-agnostic `sentinel_contract`
// traits for the same reason `sentinel-guardrails::store::GuardrailStore`
// does: authentication is a gateway concern, not an event-store one.
// Dependencies: rusqlite, sentinel-core
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use sentinel_core::ApiKeyId;
use sentinel_core::Instant;
use sentinel_core::KeyEnvironment;
use sentinel_core::TenantId;
use sentinel_core::apikey::ApiKeyRecord;
use thiserror::Error;

/// Errors raised while reading or writing the `api_keys` table.
#[derive(Debug, Error)]
pub enum ApiKeyStoreError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Db(#[from] rusqlite::Error),
    /// A persisted row failed to decode back into an [`ApiKeyRecord`].
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Thin wrapper over the shared `SQLite` connection, scoped to the
/// `api_keys` table.
#[derive(Clone)]
pub struct ApiKeyStore {
    connection: Arc<Mutex<Connection>>,
}

impl ApiKeyStore {
    /// Wraps an existing connection handle, e.g. from
    /// [`sentinel_store_sqlite::SqliteStore::connection_handle`].
    #[must_use]
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ApiKeyStoreError> {
        self.connection.lock().map_err(|_| ApiKeyStoreError::Corrupt("connection mutex poisoned".to_string()))
    }

    /// Finds the (at most one, by construction) key whose 16-character
    /// prefix matches, so the caller can run a constant-time hash
    /// comparison against `presented_secret` without scanning every row
    /// (§6 "Auth", "prefix-indexed").
    pub fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, ApiKeyStoreError> {
        let connection = self.lock()?;
        connection
            .query_row(
                "SELECT tenant_id, id, prefix, secret_hash, name, scopes_json, environment, created_at, \
                 last_used_at, revoked_at FROM api_keys WHERE prefix = ?1",
                params![prefix],
                row_to_record,
            )
            .optional()
            .map_err(ApiKeyStoreError::from)
    }

    /// Inserts a new key, or replaces an existing one with the same id.
    pub fn put(&self, record: &ApiKeyRecord) -> Result<(), ApiKeyStoreError> {
        let scopes_json = serde_json::to_vec(&record.scopes).map_err(|err| ApiKeyStoreError::Corrupt(err.to_string()))?;
        let environment = environment_to_str(record.environment);
        let connection = self.lock()?;
        connection.execute(
            "INSERT INTO api_keys \
             (tenant_id, id, prefix, secret_hash, name, scopes_json, environment, created_at, last_used_at, revoked_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             ON CONFLICT (tenant_id, id) DO UPDATE SET \
             prefix = excluded.prefix, secret_hash = excluded.secret_hash, name = excluded.name, \
             scopes_json = excluded.scopes_json, environment = excluded.environment, \
             last_used_at = excluded.last_used_at, revoked_at = excluded.revoked_at",
            params![
                record.tenant_id.as_str(),
                record.id.as_str(),
                record.prefix,
                record.secret_hash,
                record.name,
                scopes_json,
                environment,
                record.created_at.to_rfc3339(),
                record.last_used_at.as_ref().map(Instant::to_rfc3339),
                record.revoked_at.as_ref().map(Instant::to_rfc3339),
            ],
        )?;
        Ok(())
    }

    /// Stamps `last_used_at` on a successful authentication (§3 "API key").
    pub fn mark_used(&self, tenant_id: &TenantId, id: &ApiKeyId, used_at: &Instant) -> Result<(), ApiKeyStoreError> {
        let connection = self.lock()?;
        connection.execute(
            "UPDATE api_keys SET last_used_at = ?1 WHERE tenant_id = ?2 AND id = ?3",
            params![used_at.to_rfc3339(), tenant_id.as_str(), id.as_str()],
        )?;
        Ok(())
    }

    /// Revokes a key so subsequent presentations are rejected (§6 "Auth",
    /// "rejects revoked keys").
    pub fn revoke(&self, tenant_id: &TenantId, id: &ApiKeyId, revoked_at: &Instant) -> Result<(), ApiKeyStoreError> {
        let connection = self.lock()?;
        connection.execute(
            "UPDATE api_keys SET revoked_at = ?1 WHERE tenant_id = ?2 AND id = ?3",
            params![revoked_at.to_rfc3339(), tenant_id.as_str(), id.as_str()],
        )?;
        Ok(())
    }

    /// Every tenant that has minted at least one key, used by
    /// `sentinel-daemon` to enumerate tenants for the retention sweep
    /// (mirrors `GuardrailStore::list_tenant_ids`'s role for guardrail
    /// ticks).
    pub fn list_tenant_ids(&self) -> Result<Vec<TenantId>, ApiKeyStoreError> {
        let connection = self.lock()?;
        let mut statement = connection.prepare("SELECT DISTINCT tenant_id FROM api_keys")?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
        let mut tenants = Vec::new();
        for row in rows {
            tenants.push(TenantId::new(row?));
        }
        Ok(tenants)
    }
}

fn environment_to_str(environment: KeyEnvironment) -> &'static str {
    match environment {
        KeyEnvironment::Production => "production",
        KeyEnvironment::Staging => "staging",
        KeyEnvironment::Test => "test",
        KeyEnvironment::Development => "development",
    }
}

fn environment_from_str(value: &str) -> Result<KeyEnvironment, ApiKeyStoreError> {
    match value {
        "production" => Ok(KeyEnvironment::Production),
        "staging" => Ok(KeyEnvironment::Staging),
        "test" => Ok(KeyEnvironment::Test),
        "development" => Ok(KeyEnvironment::Development),
        other => Err(ApiKeyStoreError::Corrupt(format!("unknown key environment {other:?}"))),
    }
}

fn conversion_failure(column: usize, error: impl std::fmt::Display) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, error.to_string().into())
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApiKeyRecord> {
    let scopes_json: Vec<u8> = row.get(5)?;
    let environment: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let last_used_at: Option<String> = row.get(8)?;
    let revoked_at: Option<String> = row.get(9)?;

    let scopes: Vec<String> = serde_json::from_slice(&scopes_json).map_err(|err| conversion_failure(5, err))?;
    let environment = environment_from_str(&environment).map_err(|err| conversion_failure(6, err))?;
    let created_at = Instant::parse(&created_at).map_err(|err| conversion_failure(7, err))?;
    let last_used_at = last_used_at.map(|text| Instant::parse(&text)).transpose().map_err(|err| conversion_failure(8, err))?;
    let revoked_at = revoked_at.map(|text| Instant::parse(&text)).transpose().map_err(|err| conversion_failure(9, err))?;

    Ok(ApiKeyRecord {
        tenant_id: TenantId::new(row.get::<_, String>(0)?),
        id: ApiKeyId::new(row.get::<_, String>(1)?),
        prefix: row.get(2)?,
        secret_hash: row.get(3)?,
        name: row.get(4)?,
        scopes,
        environment,
        created_at,
        last_used_at,
        revoked_at,
    })
}

#[cfg(test)]
mod tests {
    use sentinel_core::apikey;

    use super::*;

    fn test_store() -> ApiKeyStore {
        let config = sentinel_store_sqlite::SqliteStoreConfig::in_memory();
        let sqlite_store = sentinel_store_sqlite::SqliteStore::open(&config).expect("open in-memory sqlite");
        ApiKeyStore::new(sqlite_store.connection_handle())
    }

    fn sample_record(tenant: &str, id: &str, prefix: &str) -> ApiKeyRecord {
        let now = Instant::now();
        ApiKeyRecord {
            id: ApiKeyId::new(id),
            tenant_id: TenantId::new(tenant),
            prefix: prefix.to_string(),
            secret_hash: apikey::hash_secret("al_test_secretsecretsecretsecret"),
            name: "ci".to_string(),
            scopes: vec!["events:write".to_string()],
            environment: KeyEnvironment::Test,
            created_at: now,
            last_used_at: None,
            revoked_at: None,
        }
    }

    #[test]
    fn put_then_find_by_prefix_round_trips() {
        let store = test_store();
        let record = sample_record("acme", "key-1", "al_test_AAAAAAAA");
        store.put(&record).expect("put");
        let fetched = store.find_by_prefix(&record.prefix).expect("find").expect("present");
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.tenant_id, record.tenant_id);
    }

    #[test]
    fn unknown_prefix_returns_none() {
        let store = test_store();
        assert!(store.find_by_prefix("al_test_NOPE").expect("find").is_none());
    }

    #[test]
    fn revoke_marks_the_record_revoked() {
        let store = test_store();
        let record = sample_record("acme", "key-1", "al_test_AAAAAAAA");
        store.put(&record).expect("put");
        store.revoke(&record.tenant_id, &record.id, &Instant::now()).expect("revoke");
        let fetched = store.find_by_prefix(&record.prefix).expect("find").expect("present");
        assert!(fetched.is_revoked());
    }

    #[test]
    fn list_tenant_ids_deduplicates_across_keys() {
        let store = test_store();
        store.put(&sample_record("acme", "key-1", "al_test_AAAAAAAA")).expect("put");
        store.put(&sample_record("acme", "key-2", "al_test_BBBBBBBB")).expect("put");
        store.put(&sample_record("globex", "key-3", "al_test_CCCCCCCC")).expect("put");
        let mut tenants = store.list_tenant_ids().expect("list").into_iter().map(TenantId::into_string).collect::<Vec<_>>();
        tenants.sort();
        assert_eq!(tenants, vec!["acme".to_string(), "globex".to_string()]);
    }
}
