// sentinel-analytics/src/replay.rs
// ============================================================================
// Module: Replay Projector
// Description: Paginated, cached replay of a single session's event
// sequence with rolling context per step (§4.7).
// Dependencies: sentinel-contract, sentinel-core
// ============================================================================

use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use sentinel_contract::EventStore;
use sentinel_contract::SentinelError;
use sentinel_core::Event;
use sentinel_core::EventType;
use sentinel_core::Instant;
use sentinel_core::SessionId;
use sentinel_core::TenantId;
use sentinel_core::TenantScope;
use serde::Deserialize;
use serde::Serialize;

/// How long a cached replay stays fresh before being recomputed (§4.7
/// "cached... for 10 minutes").
pub const REPLAY_CACHE_TTL_SECS: u64 = 600;

/// Hard upper bound on `offset + limit` for a single replay page (§4.7
/// "hard upper bound of 5 000 per request").
pub const MAX_REPLAY_PAGE_SIZE: u32 = 5_000;

/// Maximum number of cached sessions before the oldest is evicted (§4.7 "at
/// most 100 entries; the oldest entry is evicted on overflow").
const MAX_CACHE_ENTRIES: usize = 100;

/// Number of trailing LLM exchanges carried in a step's rolling context
/// (§4.7 "the last 50").
const RECENT_LLM_WINDOW: usize = 50;

/// One step of a session replay (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Position of this event in the session's full, hash-chain order.
    pub index: u64,
    /// The event itself.
    pub event: Event,
    /// Rolling context as of this step.
    pub context: StepContext,
}

/// Rolling context attached to a replay step (§4.7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepContext {
    /// Up to the last 50 `llm_call`/`llm_response` events at or before this
    /// step.
    pub recent_llm_exchanges: Vec<Event>,
    /// Every `tool_response`/`tool_error` event at or before this step.
    pub tool_results: Vec<Event>,
}

/// Session-wide summary returned alongside every page, regardless of
/// pagination (§4.7 "invariant requires the summary... to be returned even
/// under pagination").
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    /// Total `tool_call` events in the session.
    pub total_tool_calls: u64,
    /// Total `llm_call` events in the session.
    pub total_llm_calls: u64,
    /// Sum of `costUsd` across `cost_tracked` events.
    pub total_cost_usd: f64,
    /// Count of distinct `toolName` values seen on `tool_call` events.
    pub distinct_tool_names: u64,
    /// Count of events that count as errors (§4.1).
    pub error_count: u64,
}

/// A paginated replay response (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayPage {
    /// The requested page of steps.
    pub steps: Vec<Step>,
    /// Whole-session summary, independent of pagination.
    pub summary: ReplaySummary,
    /// Whether the session's hash chain validates end to end.
    pub chain_valid: bool,
    /// Total steps in the session, ignoring pagination.
    pub total: u64,
    /// True when `offset + steps.len() < total`.
    pub has_more: bool,
}

struct CachedSession {
    computed_at: Instant,
    events: Arc<Vec<Event>>,
    summary: ReplaySummary,
    chain_valid: bool,
}

/// Per-(tenant, session) cache of the computed replay sequence and summary,
/// bounded to [`MAX_CACHE_ENTRIES`] entries with FIFO eviction and a
/// [`REPLAY_CACHE_TTL_SECS`] freshness window (§4.7).
#[derive(Default)]
pub struct ReplayCache {
    entries: Mutex<VecDeque<((TenantId, SessionId), CachedSession)>>,
}

impl ReplayCache {
    /// Constructs an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Mutex::new(VecDeque::new()) }
    }

    fn get(&self, key: &(TenantId, SessionId), now: Instant) -> Option<(Arc<Vec<Event>>, ReplaySummary, bool)> {
        let mut entries = self.entries.lock();
        let position = entries.iter().position(|(entry_key, _)| entry_key == key)?;
        let fresh = {
            let (_, cached) = &entries[position];
            now.as_utc().signed_duration_since(cached.computed_at.as_utc()).num_seconds() < i64::try_from(REPLAY_CACHE_TTL_SECS).unwrap_or(i64::MAX)
        };
        if !fresh {
            entries.remove(position);
            return None;
        }
        let (_, cached) = &entries[position];
        Some((Arc::clone(&cached.events), cached.summary, cached.chain_valid))
    }

    fn put(&self, key: (TenantId, SessionId), events: Arc<Vec<Event>>, summary: ReplaySummary, chain_valid: bool, now: Instant) {
        let mut entries = self.entries.lock();
        entries.retain(|(entry_key, _)| entry_key != &key);
        entries.push_back((key, CachedSession { computed_at: now, events, summary, chain_valid }));
        while entries.len() > MAX_CACHE_ENTRIES {
            entries.pop_front();
        }
    }
}

/// Computes (or reuses a cached) replay of `session_id` and returns one
/// page, filtered by `event_types` if given (§4.7).
///
/// # Errors
///
/// Propagates whatever error the underlying
/// [`EventStore::get_events_by_session`] call returns.
#[allow(clippy::too_many_arguments, reason = "each argument is a distinct query-string parameter from §6's replay endpoint")]
pub async fn get_replay<S: EventStore + ?Sized>(
    cache: &ReplayCache,
    store: &S,
    scope: &TenantScope,
    session_id: &SessionId,
    offset: u32,
    limit: u32,
    event_types: Option<&[EventType]>,
    include_context: bool,
    now: Instant,
) -> Result<ReplayPage, SentinelError> {
    let key = (scope.tenant_id().clone(), session_id.clone());
    let (events, summary, chain_valid) = if let Some(hit) = cache.get(&key, now) {
        hit
    } else {
        let events = store.get_events_by_session(scope, session_id).await?;
        let summary = compute_summary(&events);
        let chain_valid = compute_chain_valid(&events);
        let events = Arc::new(events);
        cache.put(key, Arc::clone(&events), summary, chain_valid, now);
        (events, summary, chain_valid)
    };

    let indexed: Vec<(u64, &Event)> = events
        .iter()
        .enumerate()
        .map(|(position, event)| (u64::try_from(position).unwrap_or(u64::MAX), event))
        .filter(|(_, event)| event_types.is_none_or(|types| types.contains(&event.event_type)))
        .collect();

    let total = u64::try_from(indexed.len()).unwrap_or(u64::MAX);
    let limit = limit.min(MAX_REPLAY_PAGE_SIZE);
    let offset_usize = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit_usize = usize::try_from(limit).unwrap_or(usize::MAX);

    let steps = indexed
        .iter()
        .skip(offset_usize)
        .take(limit_usize)
        .map(|&(index, event)| Step {
            index,
            event: event.clone(),
            context: if include_context { build_context(&events, index) } else { StepContext::default() },
        })
        .collect::<Vec<_>>();

    let has_more = u64::from(offset) + u64::try_from(steps.len()).unwrap_or(0) < total;

    Ok(ReplayPage { steps, summary, chain_valid, total, has_more })
}

fn build_context(events: &[Event], up_to_index: u64) -> StepContext {
    let up_to = usize::try_from(up_to_index).unwrap_or(usize::MAX);
    let prior = &events[..=up_to.min(events.len().saturating_sub(1))];

    let recent_llm_exchanges: Vec<Event> = prior
        .iter()
        .filter(|event| matches!(event.event_type, EventType::LlmCall | EventType::LlmResponse))
        .rev()
        .take(RECENT_LLM_WINDOW)
        .rev()
        .cloned()
        .collect();

    let tool_results: Vec<Event> =
        prior.iter().filter(|event| matches!(event.event_type, EventType::ToolResponse | EventType::ToolError)).cloned().collect();

    StepContext { recent_llm_exchanges, tool_results }
}

fn compute_summary(events: &[Event]) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    let mut tool_names = HashSet::new();
    for event in events {
        match event.event_type {
            EventType::ToolCall => {
                summary.total_tool_calls += 1;
                if let Some(name) = event.payload.get("toolName").and_then(serde_json::Value::as_str) {
                    tool_names.insert(name.to_string());
                }
            }
            EventType::LlmCall => summary.total_llm_calls += 1,
            EventType::CostTracked => {
                summary.total_cost_usd += event.payload.get("costUsd").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
            }
            _ => {}
        }
        if event.counts_as_error() {
            summary.error_count += 1;
        }
    }
    summary.distinct_tool_names = u64::try_from(tool_names.len()).unwrap_or(u64::MAX);
    summary
}

fn compute_chain_valid(events: &[Event]) -> bool {
    let mut previous_hash: Option<&str> = None;
    for event in events {
        if event.prev_hash.as_deref() != previous_hash {
            return false;
        }
        if !event.hash_is_valid() {
            return false;
        }
        previous_hash = Some(event.hash.as_str());
    }
    true
}

#[cfg(test)]
mod tests {
    use sentinel_core::AgentId;
    use sentinel_core::EventId;
    use sentinel_core::Severity;
    use sentinel_core::generate_sortable_id;
    use sentinel_store_sqlite::SqliteStore;
    use sentinel_store_sqlite::SqliteStoreConfig;

    use super::*;

    fn chained_events(tenant: &str, session: &str, agent: &str, now: Instant) -> Vec<Event> {
        let mut events = Vec::new();
        let mut prev_hash = None;
        for (index, event_type) in [EventType::SessionStarted, EventType::ToolCall, EventType::ToolResponse].into_iter().enumerate() {
            let mut payload = serde_json::Map::new();
            if event_type == EventType::ToolCall || event_type == EventType::ToolResponse {
                payload.insert("toolName".to_string(), serde_json::json!("search"));
            }
            let mut event = Event {
                id: EventId::new(generate_sortable_id(u64::try_from(index).unwrap_or(0))),
                timestamp: now,
                tenant_id: TenantId::new(tenant),
                session_id: SessionId::new(session),
                agent_id: AgentId::new(agent),
                event_type,
                severity: Severity::Info,
                payload,
                metadata: serde_json::Map::new(),
                prev_hash: prev_hash.clone(),
                hash: String::new(),
            };
            event.hash = event.recompute_hash().unwrap_or_default();
            prev_hash = Some(event.hash.clone());
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn replay_page_carries_full_summary_even_when_paginated() {
        let store = SqliteStore::open(&SqliteStoreConfig::in_memory()).expect("open store");
        let now = Instant::parse("2026-01-01T00:00:00.000Z").expect("parse");
        let scope = TenantScope::new(TenantId::new("acme"));
        let session_id = SessionId::new("s1");
        store.insert_events(&scope, chained_events("acme", "s1", "agent-1", now)).await.expect("insert events");

        let cache = ReplayCache::new();
        let page = get_replay(&cache, &store, &scope, &session_id, 0, 1, None, true, now).await.expect("replay");
        assert_eq!(page.steps.len(), 1);
        assert_eq!(page.summary.total_tool_calls, 1);
        assert!(page.has_more);
        assert!(page.chain_valid);
    }

    #[tokio::test]
    async fn cache_serves_second_request_without_recomputation_drift() {
        let store = SqliteStore::open(&SqliteStoreConfig::in_memory()).expect("open store");
        let now = Instant::parse("2026-01-01T00:00:00.000Z").expect("parse");
        let scope = TenantScope::new(TenantId::new("acme"));
        let session_id = SessionId::new("s1");
        store.insert_events(&scope, chained_events("acme", "s1", "agent-1", now)).await.expect("insert events");

        let cache = ReplayCache::new();
        let first = get_replay(&cache, &store, &scope, &session_id, 0, 10, None, false, now).await.expect("first replay");
        let later = Instant::from_utc(now.as_utc() + chrono::Duration::minutes(5));
        let second = get_replay(&cache, &store, &scope, &session_id, 0, 10, None, false, later).await.expect("second replay");
        assert_eq!(first.total, second.total);
    }
}
