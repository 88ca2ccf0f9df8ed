// sentinel-guardrails/src/lib.rs
// ============================================================================
// Crate: sentinel-guardrails
// Description: Periodic guardrail rule evaluator and fail-safe action
// dispatcher (§4.6).
// ============================================================================

//! ## Overview
//! [`engine::run_tick`] is the crate's single entry point: on a fixed
//! interval it loads every enabled [`rule::GuardrailRule`] for every tenant,
//! evaluates each rule's [`rule::Condition`] against the event store
//! ([`evaluate::evaluate`]), and — subject to cooldown — dispatches the
//! rule's configured [`rule::Action`]s ([`dispatch::dispatch_actions`]).
//! Every action is fail-safe: failures are captured as a textual result
//! rather than propagated, so one misbehaving webhook cannot take down the
//! tick for other tenants. [`ssrf::guard_url`] is applied to every
//! caller-supplied destination URL before it is dialed.

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

mod dispatch;
mod engine;
mod evaluate;
mod rule;
mod ssrf;
mod store;

pub use dispatch::ActionResult;
pub use dispatch::alert_triggered_event;
pub use dispatch::dispatch_actions;
pub use engine::DEFAULT_TICK_INTERVAL_SECS;
pub use engine::TickResult;
pub use engine::run_tick;
pub use evaluate::EvaluationOutcome;
pub use evaluate::HealthScoreSource;
pub use evaluate::evaluate;
pub use rule::Action;
pub use rule::Condition;
pub use rule::CostScope;
pub use rule::GuardrailRule;
pub use rule::Operator;
pub use rule::PolicyMode;
pub use ssrf::SsrfError;
pub use ssrf::guard_url;
pub use store::GuardrailStore;
pub use store::GuardrailStoreError;
pub use store::TriggerHistoryRecord;
