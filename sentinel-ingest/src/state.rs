// sentinel-ingest/src/state.rs
// ============================================================================
// Module: Ingest Gateway State
// Description: Shared, cloneable application state handed to every axum
// handler: the storage backend, the event bus, and the auxiliary
// `SQLite`-backed tables (guardrails, API keys) that sit outside the
// storage-agnostic contract.
// Dependencies: sentinel-analytics, sentinel-bus, sentinel-contract,
// sentinel-guardrails
// ============================================================================

use std::sync::Arc;

use sentinel_analytics::ReplayCache;
use sentinel_bus::EventBus;
use sentinel_contract::EventStore;
use sentinel_guardrails::GuardrailStore;

use crate::apikeys::ApiKeyStore;

/// Everything an ingest handler needs, cloned cheaply (every field is an
/// `Arc` or itself `Clone`-over-`Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Storage backend (embedded or partitioned), behind the
    /// storage-agnostic contract.
    pub store: Arc<dyn EventStore>,
    /// Process-wide publish/subscribe fan-out, written to after every
    /// committed insert (§4.10, §5 "Cross-component operations").
    pub bus: Arc<EventBus>,
    /// Guardrail rule CRUD and trigger history (§6 `/api/guardrails*`).
    pub guardrails: GuardrailStore,
    /// API key lookup for bearer authentication (§6 "Auth").
    pub api_keys: ApiKeyStore,
    /// Paginated session replay projector (§4.7).
    pub replay_cache: Arc<ReplayCache>,
}

impl AppState {
    /// Assembles application state from its constituent parts.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, bus: Arc<EventBus>, guardrails: GuardrailStore, api_keys: ApiKeyStore) -> Self {
        Self { store, bus, guardrails, api_keys, replay_cache: Arc::new(ReplayCache::new()) }
    }
}
