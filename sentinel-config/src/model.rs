// sentinel-config/src/model.rs
// ============================================================================
// Module: Config Schema
// Description: The deserialized shape of `sentinel.toml` (SPEC_FULL.md
// §2.3): storage backend, server bind address, retention, guardrail tick,
// redaction policy, and embedding model settings.
// Dependencies: sentinel-core, sentinel-retention, serde
// ============================================================================

use sentinel_core::TenantId;
use sentinel_retention::TierDefaults;
use serde::Deserialize;
use serde::Serialize;

/// Default bind address when `[server]` omits one.
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default guardrail tick interval, in seconds, when `[guardrails]` omits
/// one (§4.6 "tick every 30 s by default").
const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;

/// Default guardrail cooldown, in seconds, applied to a rule that does not
/// set its own `cooldownSecs`.
const DEFAULT_COOLDOWN_SECS: u64 = 300;

/// Default approaching-expiry lead time, in days (§4.9 "default 7 days").
const DEFAULT_LEAD_DAYS: u32 = 7;

/// Default embedding dimensionality.
const DEFAULT_EMBEDDING_DIMENSIONS: u32 = 1536;

/// Top-level deserialized configuration (SPEC_FULL.md §2.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentinelConfig {
    /// Storage backend selection.
    pub storage: StorageConfig,
    /// HTTP/SSE server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Retention tier defaults, per-tenant overrides, and warning lead time.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Guardrail engine tick cadence and default cooldown.
    #[serde(default)]
    pub guardrails: GuardrailConfig,
    /// Redaction pipeline policy.
    #[serde(default)]
    pub redaction: RedactionConfig,
    /// Embedding model settings.
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
}

/// Selects and configures the storage backend (§4.2 "Polymorphism over
/// backends").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Single-process `SQLite` backend (C3/C4 embedded). The same database
    /// file also backs the control-plane tables (API keys, guardrail
    /// rules) that sit outside the storage-agnostic contract.
    Embedded {
        /// Path to the `SQLite` database file.
        path: String,
    },
    /// Partitioned Postgres backend (C3/C4 partitioned).
    Partitioned {
        /// Postgres connection string.
        connection_string: String,
        /// Path to the local `SQLite` database backing the control-plane
        /// tables (API keys, guardrail rules), since those stay outside
        /// the partitioned event store by design (§9 Open Question
        /// decision, `sentinel-daemon`).
        #[serde(default = "default_control_plane_path")]
        control_plane_path: String,
    },
}

fn default_control_plane_path() -> String {
    "sentinel-control.db".to_string()
}

/// HTTP/SSE server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Address the ingest gateway binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: default_bind_address() }
    }
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

/// Per-tenant retention override (§4.9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRetentionOverride {
    /// Tenant the override applies to.
    pub tenant_id: TenantId,
    /// Override retention window, in days. `0` disables retention.
    pub retention_days: u32,
}

/// Retention section (§4.9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfig {
    /// Default retention window per plan tier.
    #[serde(default)]
    pub tier_defaults: TierDefaults,
    /// Per-tenant overrides.
    #[serde(default)]
    pub overrides: Vec<TenantRetentionOverride>,
    /// Lead time, in days, for the approaching-expiry warning.
    #[serde(default = "default_lead_days")]
    pub lead_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { tier_defaults: TierDefaults::default(), overrides: Vec::new(), lead_days: default_lead_days() }
    }
}

fn default_lead_days() -> u32 {
    DEFAULT_LEAD_DAYS
}

/// Guardrail engine section (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardrailConfig {
    /// Seconds between guardrail ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Default cooldown, in seconds, applied when a rule omits
    /// `cooldownSecs`.
    #[serde(default = "default_cooldown_secs")]
    pub default_cooldown_secs: u64,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self { tick_interval_secs: default_tick_interval_secs(), default_cooldown_secs: default_cooldown_secs() }
    }
}

fn default_tick_interval_secs() -> u64 {
    DEFAULT_TICK_INTERVAL_SECS
}

fn default_cooldown_secs() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

/// Redaction pipeline policy (§4.5).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactionConfig {
    /// Tenant-specific deny-list terms, redacted unconditionally.
    #[serde(default)]
    pub deny_list_terms: Vec<String>,
    /// Whether the named-entity-recognition layer is enabled.
    #[serde(default)]
    pub ner_enabled: bool,
    /// Whether findings above the review threshold must be queued for
    /// human review rather than auto-redacted.
    #[serde(default)]
    pub require_review_queue: bool,
}

/// Embedding model section (§4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// Model identifier recorded on stored embeddings.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Vector dimensionality the model produces.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model: default_embedding_model(), dimensions: default_embedding_dimensions() }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_embedding_dimensions() -> u32 {
    DEFAULT_EMBEDDING_DIMENSIONS
}
