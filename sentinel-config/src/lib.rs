// sentinel-config
// ============================================================================
// Crate: sentinel-config
// Description: Loads and validates `sentinel.toml` (SPEC_FULL.md §2.3):
// storage backend selection, server bind address, retention tiers and
// overrides, guardrail tick cadence, redaction policy, and embedding model
// settings.
// Dependencies: sentinel-core, sentinel-retention, serde, toml, thiserror
// ============================================================================

#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "test modules favour direct assertions over production error handling"
    )
)]

mod error;
mod load;
mod model;

pub use error::ConfigError;
pub use load::CONFIG_PATH_ENV_VAR;
pub use load::DEFAULT_CONFIG_PATH;
pub use load::load;
pub use model::EmbeddingConfig;
pub use model::GuardrailConfig;
pub use model::RedactionConfig;
pub use model::RetentionConfig;
pub use model::SentinelConfig;
pub use model::ServerConfig;
pub use model::StorageConfig;
pub use model::TenantRetentionOverride;
