// sentinel-store-pg/src/schema.rs
// ============================================================================
// Module: Postgres Schema
// Description: DDL for the partitioned backend's persisted layout, plus
// monthly partition maintenance for `events` and row-level security
// policies that enforce tenant isolation at the database layer in addition
// to the `tenant_id` predicate every query already carries.
// Purpose: Keep table/index/partition definitions in one place, applied once
// at pool creation and once per insert for partition maintenance.
// Dependencies: sqlx
// ============================================================================

use chrono::DateTime;
use chrono::Datelike;
use chrono::Utc;
use sqlx::PgPool;

/// Schema version recorded in a one-row `schema_meta` table, mirroring the
/// embedded backend's `PRAGMA user_version` stamp.
pub const SCHEMA_VERSION: i32 = 1;

/// Session-local setting read back by every row-level security policy.
/// Set once per connection checkout via [`set_tenant_context`].
const TENANT_SETTING: &str = "sentinel.tenant_id";

/// Applies the partitioned backend's schema: base tables, the `events`
/// parent partitioned by month, row-level security policies, and the
/// current and next month's `events` partitions.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] when any DDL statement fails.
pub async fn initialize(pool: &PgPool) -> sqlx::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_meta (version INTEGER NOT NULL)",
    )
    .execute(pool)
    .await?;
    let row_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_meta").fetch_one(pool).await?;
    if row_count == 0 {
        sqlx::query("INSERT INTO schema_meta (version) VALUES ($1)").bind(SCHEMA_VERSION).execute(pool).await?;
    }

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS events (
            tenant_id     TEXT NOT NULL,
            id            TEXT NOT NULL,
            session_id    TEXT NOT NULL,
            agent_id      TEXT NOT NULL,
            timestamp     TIMESTAMPTZ NOT NULL,
            event_type    TEXT NOT NULL,
            severity      TEXT NOT NULL,
            payload_json  JSONB NOT NULL,
            metadata_json JSONB NOT NULL,
            prev_hash     TEXT,
            hash          TEXT NOT NULL,
            PRIMARY KEY (tenant_id, id, timestamp)
        ) PARTITION BY RANGE (timestamp)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_session ON events (tenant_id, session_id, timestamp)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_tenant_type ON events (tenant_id, event_type, timestamp)")
        .execute(pool)
        .await?;
    sqlx::query("ALTER TABLE events ENABLE ROW LEVEL SECURITY").execute(pool).await?;
    create_policy_if_absent(pool, "events", "tenant_isolation_events").await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sessions (
            tenant_id        TEXT NOT NULL,
            id               TEXT NOT NULL,
            agent_id         TEXT NOT NULL,
            agent_name       TEXT,
            started_at       TIMESTAMPTZ NOT NULL,
            ended_at         TIMESTAMPTZ,
            status           TEXT NOT NULL,
            event_count      BIGINT NOT NULL,
            tool_call_count  BIGINT NOT NULL,
            error_count      BIGINT NOT NULL,
            llm_call_count   BIGINT NOT NULL,
            input_tokens     BIGINT NOT NULL,
            output_tokens    BIGINT NOT NULL,
            cost_usd         DOUBLE PRECISION NOT NULL,
            tags_json        JSONB NOT NULL,
            PRIMARY KEY (tenant_id, id)
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_tenant_started ON sessions (tenant_id, started_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_tenant_agent ON sessions (tenant_id, agent_id)")
        .execute(pool)
        .await?;
    sqlx::query("ALTER TABLE sessions ENABLE ROW LEVEL SECURITY").execute(pool).await?;
    create_policy_if_absent(pool, "sessions", "tenant_isolation_sessions").await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS agents (
            tenant_id       TEXT NOT NULL,
            id              TEXT NOT NULL,
            name            TEXT,
            first_seen      TIMESTAMPTZ NOT NULL,
            last_seen       TIMESTAMPTZ NOT NULL,
            session_count   BIGINT NOT NULL,
            model_override  TEXT,
            paused_at       TIMESTAMPTZ,
            pause_reason    TEXT,
            PRIMARY KEY (tenant_id, id)
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query("ALTER TABLE agents ENABLE ROW LEVEL SECURITY").execute(pool).await?;
    create_policy_if_absent(pool, "agents", "tenant_isolation_agents").await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS embeddings (
            tenant_id     TEXT NOT NULL,
            id            TEXT NOT NULL,
            source_type   TEXT NOT NULL,
            source_id     TEXT NOT NULL,
            content_hash  TEXT NOT NULL,
            text          TEXT NOT NULL,
            vector        DOUBLE PRECISION[] NOT NULL,
            model         TEXT NOT NULL,
            dimensions    INTEGER NOT NULL,
            created_at    TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (tenant_id, id)
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_embeddings_source ON embeddings (tenant_id, source_type, source_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("ALTER TABLE embeddings ENABLE ROW LEVEL SECURITY").execute(pool).await?;
    create_policy_if_absent(pool, "embeddings", "tenant_isolation_embeddings").await?;

    sqlx::query(
        "CREATE OR REPLACE FUNCTION severity_rank(value TEXT) RETURNS INTEGER AS $$
            SELECT CASE value
                WHEN 'debug' THEN 0
                WHEN 'info' THEN 1
                WHEN 'warn' THEN 2
                WHEN 'error' THEN 3
                WHEN 'critical' THEN 4
                ELSE 0
            END
         $$ LANGUAGE SQL IMMUTABLE",
    )
    .execute(pool)
    .await?;

    // Pushes similarity ranking into the database so this backend can report
    // a native vector-search capability without depending on an external
    // vector extension: the two arrays are summed element-wise via `unnest`
    // rather than looping in PL/pgSQL.
    sqlx::query(
        "CREATE OR REPLACE FUNCTION sentinel_cosine_similarity(a DOUBLE PRECISION[], b DOUBLE PRECISION[]) \
         RETURNS DOUBLE PRECISION AS $$
            SELECT CASE
                WHEN sqrt(sum(x * x)) = 0 OR sqrt(sum(y * y)) = 0 THEN 0.0
                ELSE sum(x * y) / (sqrt(sum(x * x)) * sqrt(sum(y * y)))
            END
            FROM unnest(a) WITH ORDINALITY AS ta(x, idx)
            JOIN unnest(b) WITH ORDINALITY AS tb(y, idy) ON idx = idy
         $$ LANGUAGE SQL IMMUTABLE",
    )
    .execute(pool)
    .await?;

    ensure_month_partition(pool, Utc::now()).await?;
    ensure_month_partition(pool, Utc::now() + chrono::Duration::days(31)).await?;

    Ok(())
}

/// Creates a tenant-isolation row-level security policy on `table_name` if
/// one named `policy_name` does not already exist. `pg_policies` has no
/// `IF NOT EXISTS` clause for `CREATE POLICY`, so existence is checked
/// explicitly first.
async fn create_policy_if_absent(pool: &PgPool, table_name: &str, policy_name: &str) -> sqlx::Result<()> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM pg_policies WHERE tablename = $1 AND policyname = $2)",
    )
    .bind(table_name)
    .bind(policy_name)
    .fetch_one(pool)
    .await?;
    if exists {
        return Ok(());
    }
    let statement = format!(
        "CREATE POLICY {policy_name} ON {table_name} \
         USING (tenant_id = current_setting('{TENANT_SETTING}', true))"
    );
    sqlx::query(&statement).execute(pool).await?;
    Ok(())
}

/// Sets the session-local tenant context a row-level security policy reads
/// back. Must be called on every checked-out connection before it touches a
/// tenant-scoped table; callers that bypass it fail closed, since an unset
/// setting compares equal to nothing.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if the `SET LOCAL` statement fails.
pub async fn set_tenant_context(connection: &mut sqlx::PgConnection, tenant_id: &str) -> sqlx::Result<()> {
    sqlx::query(&format!("SET LOCAL {TENANT_SETTING} = '{}'", tenant_id.replace('\'', "''")))
        .execute(connection)
        .await?;
    Ok(())
}

/// Clears the session-local tenant context, used by administrative
/// operations (retention, partition maintenance) that must see every
/// tenant's rows.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if the `RESET` statement fails.
pub async fn reset_tenant_context(connection: &mut sqlx::PgConnection) -> sqlx::Result<()> {
    sqlx::query(&format!("RESET {TENANT_SETTING}")).execute(connection).await?;
    Ok(())
}

/// Name of the monthly partition covering `timestamp`, e.g. `events_y2026m07`.
#[must_use]
pub fn partition_name_for(timestamp: DateTime<Utc>) -> String {
    format!("events_y{:04}m{:02}", timestamp.year(), timestamp.month())
}

/// Creates the monthly `events` partition covering `timestamp` if it does
/// not already exist.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] when the `CREATE TABLE ... PARTITION OF`
/// statement fails.
pub async fn ensure_month_partition(pool: &PgPool, timestamp: DateTime<Utc>) -> sqlx::Result<()> {
    let name = partition_name_for(timestamp);
    let start = chrono::NaiveDate::from_ymd_opt(timestamp.year(), timestamp.month(), 1)
        .unwrap_or_else(|| chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default());
    let (end_year, end_month) = if timestamp.month() == 12 { (timestamp.year() + 1, 1) } else { (timestamp.year(), timestamp.month() + 1) };
    let end = chrono::NaiveDate::from_ymd_opt(end_year, end_month, 1)
        .unwrap_or_else(|| chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default());
    let statement = format!(
        "CREATE TABLE IF NOT EXISTS {name} PARTITION OF events FOR VALUES FROM ('{}') TO ('{}')",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d"),
    );
    sqlx::query(&statement).execute(pool).await?;
    Ok(())
}

/// Every `events` partition whose upper bound is on or before `cutoff`,
/// oldest first. Used by [`crate::store::PgStore::drop_partitions_below`] to
/// decide which whole partitions can be dropped rather than row-deleted,
/// bounded by the maximum retention window among tenants sharing a
/// partition.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if `pg_inherits`/`pg_class` cannot be queried.
pub async fn partitions_older_than(pool: &PgPool, cutoff: DateTime<Utc>) -> sqlx::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT child.relname FROM pg_inherits \
         JOIN pg_class parent ON pg_inherits.inhparent = parent.oid \
         JOIN pg_class child ON pg_inherits.inhrelid = child.oid \
         WHERE parent.relname = 'events' AND child.relname LIKE 'events\\_y%' ESCAPE '\\' \
         ORDER BY child.relname",
    )
    .fetch_all(pool)
    .await?;
    let mut names = Vec::new();
    for (name,) in rows {
        if let Some(upper_bound) = partition_upper_bound(&name) {
            if upper_bound <= cutoff {
                names.push(name);
            }
        }
    }
    Ok(names)
}

/// Parses a partition name of the shape `events_yYYYYmMM` back into the
/// first instant of the following month, which is that partition's upper
/// bound.
fn partition_upper_bound(name: &str) -> Option<DateTime<Utc>> {
    let rest = name.strip_prefix("events_y")?;
    let (year_str, month_str) = rest.split_once('m')?;
    let year: i32 = year_str.parse().ok()?;
    let month: u32 = month_str.parse().ok()?;
    let (end_year, end_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let date = chrono::NaiveDate::from_ymd_opt(end_year, end_month, 1)?;
    Some(DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0)?, Utc))
}

/// Drops an `events` partition by name. Callers are expected to have
/// obtained the name from [`partitions_older_than`], which already
/// constrains it to the `events_y%` shape; the name is still escaped as a
/// Postgres identifier defensively since it is interpolated into DDL.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if the `DROP TABLE` statement fails.
pub async fn drop_partition(pool: &PgPool, partition_name: &str) -> sqlx::Result<()> {
    let quoted = partition_name.replace('"', "\"\"");
    sqlx::query(&format!("DROP TABLE IF EXISTS \"{quoted}\"")).execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_name_formats_year_and_month() {
        let timestamp = DateTime::parse_from_rfc3339("2026-07-15T00:00:00Z").expect("parse").with_timezone(&Utc);
        assert_eq!(partition_name_for(timestamp), "events_y2026m07");
    }

    #[test]
    fn upper_bound_rolls_over_into_next_year() {
        let bound = partition_upper_bound("events_y2026m12").expect("parse partition name");
        assert_eq!(bound.year(), 2027);
        assert_eq!(bound.month(), 1);
    }

    #[test]
    fn upper_bound_rejects_malformed_names() {
        assert!(partition_upper_bound("events_default").is_none());
    }
}
