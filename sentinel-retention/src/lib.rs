// sentinel-retention/src/lib.rs
// ============================================================================
// Crate: sentinel-retention
// Description: Daily per-tenant retention sweep and approaching-expiry
// warnings (C9).
// ============================================================================

//! ## Overview
//! `sentinel-retention` is the only caller of
//! [`sentinel_contract::EventStore::apply_retention`] and
//! [`sentinel_contract::EventStore::drop_partitions_below`] outside of
//! tests. It is storage-agnostic: it resolves each tenant's effective
//! retention window from [`PlanTier`]/[`RetentionPolicy`], then drives the
//! contract. `sentinel-daemon` is expected to invoke
//! [`run_purge_cycle`] once a day at [`DAILY_CRON_HOUR_UTC`].

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

mod policy;
mod purge;

pub use policy::PlanTier;
pub use policy::RetentionPolicy;
pub use policy::TierDefaults;
pub use purge::run_purge_cycle;
pub use purge::PurgeOutcome;
pub use purge::PurgeReport;
pub use purge::DAILY_CRON_HOUR_UTC;
pub use purge::DEFAULT_LEAD_DAYS;
