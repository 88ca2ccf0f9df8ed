// sentinel-bus/src/lib.rs
// ============================================================================
// Crate: sentinel-bus
// Description: Process-wide publish/subscribe fan-out for appended events
// (§4.11).
// ============================================================================

//! ## Overview
//! [`EventBus`] is the in-process notification path between the Event Store
//! and its consumers (Analytics Projections, the Guardrail Engine, SSE
//! fan-out). Publication is synchronous from the publisher's point of view:
//! `emit` walks the subscriber set once and returns. A slow or stalled
//! subscriber never blocks the publisher — each subscription is a bounded
//! channel, and a full channel is a dropped event plus an incremented
//! per-subscriber counter, not a backpressure signal (§4.11, §5 "Shared
//! resources" (iv)). There are no durability guarantees: an unsubscribed or
//! restarted process loses in-flight notifications, which is acceptable
//! because the Event Store already holds the durable copy.

#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "test code favors clarity over the production error-handling discipline"
    )
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use parking_lot::RwLock;
use sentinel_core::AgentId;
use sentinel_core::Event;
use sentinel_core::EventType;
use sentinel_core::SessionId;
use sentinel_core::TenantId;
use tokio::sync::mpsc;

// ============================================================================
// SECTION: Subscription filter
// ============================================================================

/// Predicate a subscriber registers to select which events it receives
/// (§4.10 SSE filtering, §4.11 "Subscribers register with a filter
/// predicate").
#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    /// Tenant this subscription is scoped to. Required: the bus never lets
    /// a subscriber observe another tenant's events.
    pub tenant_id: TenantId,
    /// Optional restriction to a single session.
    pub session_id: Option<SessionId>,
    /// Optional restriction to a single agent.
    pub agent_id: Option<AgentId>,
    /// Optional restriction to a single event type.
    pub event_type: Option<EventType>,
}

impl SubscriptionFilter {
    /// Builds a filter matching every event for the given tenant.
    #[must_use]
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self { tenant_id, session_id: None, agent_id: None, event_type: None }
    }

    fn matches(&self, event: &Event) -> bool {
        if event.tenant_id != self.tenant_id {
            return false;
        }
        if let Some(ref session_id) = self.session_id {
            if &event.session_id != session_id {
                return false;
            }
        }
        if let Some(ref agent_id) = self.agent_id {
            if &event.agent_id != agent_id {
                return false;
            }
        }
        if let Some(event_type) = self.event_type {
            if event.event_type != event_type {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// SECTION: Subscription handle
// ============================================================================

/// Opaque handle identifying a live subscription, returned by
/// [`EventBus::subscribe`] and required by [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A single registered subscriber: its filter, mailbox, and drop counter.
struct Subscriber {
    /// Predicate deciding which events reach this subscriber.
    filter: SubscriptionFilter,
    /// Bounded mailbox the subscriber reads from.
    sender: mpsc::Sender<Event>,
    /// Count of events dropped because the mailbox was full.
    dropped: Arc<AtomicU64>,
}

/// Default bound on a subscriber's mailbox before the bus starts dropping
/// events for it (§4.11 "configurable high-water mark").
pub const DEFAULT_HIGH_WATER_MARK: usize = 256;

// ============================================================================
// SECTION: Event Bus
// ============================================================================

/// Process-wide publish/subscribe fan-out (§4.11).
///
/// # Invariants
/// - `emit` never blocks on a slow subscriber: a full mailbox drops the
///   event for that subscriber and increments its drop counter instead of
///   awaiting capacity.
/// - Subscribers never observe events for a tenant other than the one
///   their filter was constructed with.
pub struct EventBus {
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Constructs an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self { subscribers: RwLock::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Registers a subscriber with the given filter and mailbox capacity,
    /// returning its handle and the receiving end of its channel.
    #[must_use]
    pub fn subscribe(&self, filter: SubscriptionFilter, high_water_mark: usize) -> (SubscriptionId, mpsc::Receiver<Event>) {
        let (sender, receiver) = mpsc::channel(high_water_mark.max(1));
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscriber = Subscriber { filter, sender, dropped: Arc::new(AtomicU64::new(0)) };
        self.subscribers.write().insert(id, subscriber);
        tracing::debug!(subscription_id = id.0, "subscriber registered");
        (id, receiver)
    }

    /// Removes a subscriber. A no-op if the handle is already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().remove(&id);
        tracing::debug!(subscription_id = id.0, "subscriber removed");
    }

    /// Publishes an event to every matching subscriber. Subscribers whose
    /// mailbox is full have the event dropped for them, not for anyone
    /// else, and their drop counter is incremented (§4.11).
    pub fn emit(&self, event: &Event) {
        let subscribers = self.subscribers.read();
        for (id, subscriber) in subscribers.iter() {
            if !subscriber.filter.matches(event) {
                continue;
            }
            if let Err(mpsc::error::TrySendError::Full(_)) = subscriber.sender.try_send(event.clone()) {
                subscriber.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    subscription_id = id.0,
                    tenant_id = %event.tenant_id,
                    "subscriber mailbox full, event dropped"
                );
            }
        }
    }

    /// Number of events dropped for the given subscriber since it
    /// subscribed, or `None` if the subscription no longer exists.
    #[must_use]
    pub fn drop_count(&self, id: SubscriptionId) -> Option<u64> {
        self.subscribers.read().get(&id).map(|subscriber| subscriber.dropped.load(Ordering::Relaxed))
    }

    /// Number of live subscriptions, for diagnostics.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use sentinel_core::EventId;
    use sentinel_core::Instant;
    use sentinel_core::Severity;
    use sentinel_core::compute_event_hash;
    use serde_json::Map;

    use super::*;

    fn sample_event(tenant: &str, session: &str) -> Event {
        let id = EventId::new("e1");
        let timestamp = Instant::now();
        let tenant_id = TenantId::new(tenant);
        let session_id = SessionId::new(session);
        let agent_id = AgentId::new("agent-1");
        let event_type = EventType::ToolCall;
        let severity = Severity::Info;
        let payload = Map::new();
        let metadata = Map::new();
        let hash = compute_event_hash(&id, &timestamp, &session_id, &agent_id, event_type, severity, &payload, &metadata, &None)
            .expect("hash");
        Event { id, timestamp, tenant_id, session_id, agent_id, event_type, severity, payload, metadata, prev_hash: None, hash }
    }

    #[tokio::test]
    async fn matching_subscriber_receives_emitted_event() {
        let bus = EventBus::new();
        let (_, mut receiver) = bus.subscribe(SubscriptionFilter::for_tenant(TenantId::new("acme")), 8);
        bus.emit(&sample_event("acme", "sess-1"));
        let received = receiver.recv().await.expect("event delivered");
        assert_eq!(received.tenant_id, TenantId::new("acme"));
    }

    #[tokio::test]
    async fn subscriber_never_sees_another_tenants_events() {
        let bus = EventBus::new();
        let (_, mut receiver) = bus.subscribe(SubscriptionFilter::for_tenant(TenantId::new("acme")), 8);
        bus.emit(&sample_event("globex", "sess-1"));
        assert!(receiver.try_recv().is_err(), "filter must reject cross-tenant events");
    }

    #[tokio::test]
    async fn full_mailbox_drops_event_and_increments_counter() {
        let bus = EventBus::new();
        let (id, _receiver) = bus.subscribe(SubscriptionFilter::for_tenant(TenantId::new("acme")), 1);
        bus.emit(&sample_event("acme", "sess-1"));
        bus.emit(&sample_event("acme", "sess-1"));
        assert_eq!(bus.drop_count(id), Some(1), "second emit must be dropped once the mailbox is full");
    }

    #[tokio::test]
    async fn unsubscribe_removes_the_subscriber() {
        let bus = EventBus::new();
        let (id, _receiver) = bus.subscribe(SubscriptionFilter::for_tenant(TenantId::new("acme")), 8);
        assert_eq!(bus.subscriber_count(), 1);
        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
