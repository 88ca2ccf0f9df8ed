// sentinel-config/src/load.rs
// ============================================================================
// Module: Config Loading
// Description: Reads and validates `sentinel.toml` from disk, fail-closed
// (SPEC_FULL.md §2.3).
// Purpose: Guard against pathological paths and oversized/malformed input
// before ever touching the filesystem content, matching the
// `decision-gate-config` load guards this crate is grounded on.
// Dependencies: std::fs, toml
// ============================================================================

use std::path::Path;

use crate::error::ConfigError;
use crate::model::SentinelConfig;

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV_VAR: &str = "SENTINEL_CONFIG";

/// Default config file path when neither an explicit path nor
/// [`CONFIG_PATH_ENV_VAR`] is set.
pub const DEFAULT_CONFIG_PATH: &str = "sentinel.toml";

/// Hard cap on the resolved path's string length.
const MAX_PATH_LEN: usize = 5_000;

/// Hard cap on any single path component's length.
const MAX_PATH_COMPONENT_LEN: usize = 300;

/// Hard cap on the config file's size, in bytes (1 MiB).
const MAX_CONFIG_FILE_BYTES: usize = 1_048_576;

/// Loads and validates the configuration from `path`, falling back to
/// [`CONFIG_PATH_ENV_VAR`] and then [`DEFAULT_CONFIG_PATH`] when `path` is
/// `None` (SPEC_FULL.md §2.3).
///
/// # Errors
///
/// Returns [`ConfigError`] on any path, size, encoding, parse, or
/// validation failure. Every case is fatal for the caller.
pub fn load(path: Option<&Path>) -> Result<SentinelConfig, ConfigError> {
    let owned_path;
    let resolved: &Path = match path {
        Some(path) => path,
        None => match std::env::var(CONFIG_PATH_ENV_VAR) {
            Ok(value) => {
                owned_path = value;
                Path::new(&owned_path)
            }
            Err(_) => Path::new(DEFAULT_CONFIG_PATH),
        },
    };

    check_path(resolved)?;

    let bytes = std::fs::read(resolved).map_err(ConfigError::Io)?;
    if bytes.len() > MAX_CONFIG_FILE_BYTES {
        return Err(ConfigError::TooLarge);
    }
    let text = String::from_utf8(bytes).map_err(|_utf8_error| ConfigError::NotUtf8)?;
    let config: SentinelConfig = toml::from_str(&text).map_err(ConfigError::Parse)?;
    validate(&config)?;
    Ok(config)
}

fn check_path(path: &Path) -> Result<(), ConfigError> {
    let path_str = path.to_string_lossy();
    if path_str.len() > MAX_PATH_LEN {
        return Err(ConfigError::PathTooLong);
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LEN {
            return Err(ConfigError::PathComponentTooLong);
        }
    }
    Ok(())
}

fn validate(config: &SentinelConfig) -> Result<(), ConfigError> {
    if config.guardrails.tick_interval_secs == 0 {
        return Err(ConfigError::Validation("guardrails.tickIntervalSecs must be greater than zero".to_string()));
    }
    if config.embeddings.dimensions == 0 {
        return Err(ConfigError::Validation("embeddings.dimensions must be greater than zero".to_string()));
    }
    if config.server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bindAddress must not be empty".to_string()));
    }
    match &config.storage {
        crate::model::StorageConfig::Embedded { path } if path.trim().is_empty() => {
            return Err(ConfigError::Validation("storage.path must not be empty for the embedded backend".to_string()));
        }
        crate::model::StorageConfig::Partitioned { connection_string, .. } if connection_string.trim().is_empty() => {
            return Err(ConfigError::Validation("storage.connectionString must not be empty for the partitioned backend".to_string()));
        }
        crate::model::StorageConfig::Partitioned { control_plane_path, .. } if control_plane_path.trim().is_empty() => {
            return Err(ConfigError::Validation("storage.controlPlanePath must not be empty for the partitioned backend".to_string()));
        }
        crate::model::StorageConfig::Embedded { .. } | crate::model::StorageConfig::Partitioned { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_valid_toml() -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp file");
        write!(file, "[storage]\nbackend = \"embedded\"\npath = \"sentinel.db\"\n").expect("write temp file");
        file
    }

    #[test]
    fn load_rejects_path_too_long() {
        let long_path = "a".repeat(5_000);
        let err = load(Some(Path::new(&long_path))).expect_err("must reject");
        assert!(err.to_string().contains("config path exceeds max length"));
    }

    #[test]
    fn load_rejects_path_component_too_long() {
        let long_component = "a".repeat(300);
        let err = load(Some(Path::new(&long_component))).expect_err("must reject");
        assert!(err.to_string().contains("config path component too long"));
    }

    #[test]
    fn load_rejects_oversized_file() {
        let mut file = NamedTempFile::new().expect("create temp file");
        let payload = vec![b'a'; MAX_CONFIG_FILE_BYTES + 1];
        file.write_all(&payload).expect("write temp file");
        let err = load(Some(file.path())).expect_err("must reject");
        assert!(err.to_string().contains("config file exceeds size limit"));
    }

    #[test]
    fn load_rejects_non_utf8_file() {
        let mut file = NamedTempFile::new().expect("create temp file");
        file.write_all(&[0xFF, 0xFE, 0xFF]).expect("write temp file");
        let err = load(Some(file.path())).expect_err("must reject");
        assert!(err.to_string().contains("config file must be utf-8"));
    }

    #[test]
    fn load_accepts_minimal_valid_config() {
        let file = write_valid_toml();
        let config = load(Some(file.path())).expect("load valid config");
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.guardrails.tick_interval_secs, 30);
    }

    #[test]
    fn load_rejects_empty_control_plane_path() {
        let mut file = NamedTempFile::new().expect("create temp file");
        write!(
            file,
            "[storage]\nbackend = \"partitioned\"\nconnectionString = \"postgres://localhost/sentinel\"\ncontrolPlanePath = \"\"\n"
        )
        .expect("write temp file");
        let err = load(Some(file.path())).expect_err("must reject");
        assert!(err.to_string().contains("controlPlanePath"));
    }

    #[test]
    fn load_rejects_zero_tick_interval() {
        let mut file = NamedTempFile::new().expect("create temp file");
        write!(file, "[storage]\nbackend = \"embedded\"\npath = \"sentinel.db\"\n[guardrails]\ntickIntervalSecs = 0\n").expect("write temp file");
        let err = load(Some(file.path())).expect_err("must reject");
        assert!(err.to_string().contains("tickIntervalSecs"));
    }
}
