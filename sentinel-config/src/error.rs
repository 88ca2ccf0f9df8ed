// sentinel-config/src/error.rs
// ============================================================================
// Module: Config Errors
// Description: Failure modes for loading and parsing `sentinel.toml`.
// Purpose: Every variant is fatal — the daemon exits 1 on any of these
// (§6 "Exit codes").
// Dependencies: thiserror
// ============================================================================

use thiserror::Error;

/// Everything that can go wrong loading configuration. Every variant is
/// fatal (§6 "1 on fatal initialisation failure").
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The resolved config path's string length exceeded the guard.
    #[error("config path exceeds max length")]
    PathTooLong,
    /// One path component exceeded the guard.
    #[error("config path component too long")]
    PathComponentTooLong,
    /// The file could not be read from disk.
    #[error("config file could not be read: {0}")]
    Io(#[source] std::io::Error),
    /// The file exceeded the size cap.
    #[error("config file exceeds size limit")]
    TooLarge,
    /// The file's bytes were not valid UTF-8.
    #[error("config file must be utf-8")]
    NotUtf8,
    /// The file was valid UTF-8 but not valid TOML, or did not match the
    /// expected schema.
    #[error("config file could not be parsed: {0}")]
    Parse(#[source] toml::de::Error),
    /// The file parsed but failed a semantic check (e.g. an out-of-range
    /// value).
    #[error("config failed validation: {0}")]
    Validation(String),
}
