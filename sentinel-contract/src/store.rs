// sentinel-contract/src/store.rs
// ============================================================================
// Module: Sentinel Storage Contract
// Description: The dialect-neutral event/session/agent/embedding interface
// satisfied by the embedded and partitioned backends (§4.2).
// Purpose: Let every caller above storage (ingest, guardrails, analytics,
// retention, replay) depend on one trait object instead of a concrete
// backend.
// Dependencies: async-trait, sentinel-core, crate::{agent, capabilities,
// embedding, error, filter, retention, session, stats}
// ============================================================================

//! ## Overview
//! [`EventStore`] is the capability interface described in §4.2 and §9
//! ("Polymorphism over backends"): every operation takes a [`TenantScope`]
//! and MUST refuse to return rows belonging to another tenant (§8 property
//! 6). [`EmbeddingStore`] is kept as a separate trait because not every
//! deployment needs semantic recall, and because its native-vs-fallback
//! strategy selection (§4.4) is orthogonal to event persistence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use sentinel_core::AdminScope;
use sentinel_core::AgentId;
use sentinel_core::Event;
use sentinel_core::EventId;
use sentinel_core::Instant;
use sentinel_core::SessionId;
use sentinel_core::TenantScope;

use crate::agent::AgentRecord;
use crate::capabilities::StorageCapabilities;
use crate::embedding::Embedding;
use crate::embedding::SimilarityFilter;
use crate::embedding::SimilarityMatch;
use crate::error::SentinelError;
use crate::filter::EventFilter;
use crate::filter::EventPage;
use crate::filter::SessionFilter;
use crate::retention::ExpiryWarning;
use crate::retention::RetentionOutcome;
use crate::session::Session;
use crate::stats::StoreStats;

// ============================================================================
// SECTION: Event Store
// ============================================================================

/// The dialect-neutral event/session/agent store (§4.2).
///
/// # Invariants
/// - Every method is tenant-scoped and never returns rows for another
///   tenant (§8 property 6).
/// - `insert_events` is atomic: either every event in the batch is
///   persisted (along with the session/agent projection updates) or none
///   are (§4.3 "Failure semantics").
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Reports this backend's optional capabilities.
    fn capabilities(&self) -> StorageCapabilities;

    /// Atomically appends a batch of events, enforcing the hash-chain
    /// invariant and updating session/agent projections (§4.3).
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::HashChain`] or [`SentinelError::Validation`]
    /// when the batch is rejected; the whole batch is rolled back. An
    /// event id that already exists with identical fields is absorbed
    /// idempotently rather than erroring (§3 "insertEvents").
    async fn insert_events(&self, scope: &TenantScope, events: Vec<Event>) -> Result<(), SentinelError>;

    /// Fetches a single event by id.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn get_event(&self, scope: &TenantScope, id: &EventId) -> Result<Option<Event>, SentinelError>;

    /// Fetches every event in a session, ascending by timestamp (§4.2).
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn get_events_by_session(
        &self,
        scope: &TenantScope,
        session_id: &SessionId,
    ) -> Result<Vec<Event>, SentinelError>;

    /// Runs a filtered, paginated event query (§4.2).
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn query_events(&self, scope: &TenantScope, filter: &EventFilter) -> Result<EventPage, SentinelError>;

    /// Fetches a session by id.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn get_session(&self, scope: &TenantScope, id: &SessionId) -> Result<Option<Session>, SentinelError>;

    /// Inserts or replaces a session row.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn upsert_session(&self, scope: &TenantScope, session: Session) -> Result<(), SentinelError>;

    /// Runs a filtered, paginated session query (§4.2, §6).
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn get_sessions(&self, scope: &TenantScope, filter: &SessionFilter) -> Result<Vec<Session>, SentinelError>;

    /// Counts sessions matching a filter without materializing rows (§6
    /// `countOnly=true`).
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn count_sessions(&self, scope: &TenantScope, filter: &SessionFilter) -> Result<u64, SentinelError>;

    /// Fetches an agent by id.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn get_agent(&self, scope: &TenantScope, id: &AgentId) -> Result<Option<AgentRecord>, SentinelError>;

    /// Inserts or replaces an agent row.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn upsert_agent(&self, scope: &TenantScope, agent: AgentRecord) -> Result<(), SentinelError>;

    /// Fetches every agent for a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn get_agents(&self, scope: &TenantScope) -> Result<Vec<AgentRecord>, SentinelError>;

    /// Returns per-tenant totals (§4.2 `getStats`).
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn get_stats(&self, scope: &TenantScope) -> Result<StoreStats, SentinelError>;

    /// Deletes events (and any session that drops to zero events) older
    /// than `cutoff` for the scoped tenant (§4.2, §4.3 "Retention
    /// operation").
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn apply_retention(&self, scope: &TenantScope, cutoff: Instant) -> Result<RetentionOutcome, SentinelError>;

    /// Performs backend maintenance that spans every tenant (partition
    /// drops in §4.9). Embedded backends implement this as a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn drop_partitions_below(&self, _admin: &AdminScope, _global_cutoff: Instant) -> Result<u64, SentinelError> {
        Ok(0)
    }

    /// Counts rows that will fall out of retention within `lead_days` of
    /// `now`, for the retention purger's approaching-expiry warning (§4.9,
    /// §3 supplement). The default implementation reports zero; concrete
    /// backends override this to run a real count.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn expiring_row_count(
        &self,
        scope: &TenantScope,
        _now: Instant,
        _retention_days: u32,
        lead_days: u32,
    ) -> Result<ExpiryWarning, SentinelError> {
        Ok(ExpiryWarning { tenant_id: scope.tenant_id().clone(), rows_expiring: 0, lead_days })
    }
}

// ============================================================================
// SECTION: Embedding Store
// ============================================================================

/// The embedding persistence and similarity-search interface (§4.4).
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Reports this backend's optional capabilities.
    fn capabilities(&self) -> StorageCapabilities;

    /// Stores or updates an embedding for the given (tenant, source_type,
    /// source_id) tuple (§3 "Embedding", §8 property 4).
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn store(&self, scope: &TenantScope, embedding: Embedding) -> Result<(), SentinelError>;

    /// Deletes the embedding for a (source_type, source_id) tuple, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn delete(
        &self,
        scope: &TenantScope,
        source_type: crate::embedding::SourceType,
        source_id: &str,
    ) -> Result<(), SentinelError>;

    /// Runs a similarity search (§4.4).
    ///
    /// # Errors
    ///
    /// Returns [`SentinelError::Unavailable`] on a transient backend fault.
    async fn similarity_search(
        &self,
        scope: &TenantScope,
        query_vector: &[f32],
        filter: &SimilarityFilter,
    ) -> Result<Vec<SimilarityMatch>, SentinelError>;
}
