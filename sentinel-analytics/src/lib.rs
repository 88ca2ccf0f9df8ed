// sentinel-analytics/src/lib.rs
// ============================================================================
// Crate: sentinel-analytics
// Description: Health-score and cost-optimisation projections (§4.8) plus
// the session replay projector (§4.7).
// ============================================================================

//! ## Overview
//! This crate turns the raw event stream into the three read models C8
//! promises: a per-agent health score, cost-optimisation recommendations,
//! and a cached, paginated replay of a single session (C7). None of it
//! mutates storage; every function here is a pure projection over
//! [`sentinel_contract::EventStore`].

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

mod cost;
mod health;
mod replay;

pub use cost::Confidence;
pub use cost::ComplexityTier;
pub use cost::ComplexityThresholds;
pub use cost::CostRecommendation;
pub use cost::ModelCostEntry;
pub use cost::recommend_cost_optimizations;
pub use health::DEFAULT_WINDOW_DAYS;
pub use health::DimensionScore;
pub use health::HealthScore;
pub use health::HealthScoreCache;
pub use health::HealthWeights;
pub use health::Trend;
pub use health::compute_health_score;
pub use replay::MAX_REPLAY_PAGE_SIZE;
pub use replay::REPLAY_CACHE_TTL_SECS;
pub use replay::ReplayCache;
pub use replay::ReplayPage;
pub use replay::ReplaySummary;
pub use replay::Step;
pub use replay::StepContext;
pub use replay::get_replay;
