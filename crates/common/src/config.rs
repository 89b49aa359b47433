use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Upper bound on exclusive-create attempts before a pattern is declared exhausted.
pub const DEFAULT_MAX_CREATE_ATTEMPTS: u32 = 10_000;

/// Permission bits given to newly created segments.
pub const DEFAULT_CREATE_MODE: u32 = 0o600;

/// Top-level application config — loaded from config/config.toml
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub shm: ShmConfig,
    #[serde(default)]
    pub segment: Vec<SegmentConfig>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    pub log_level: String,
}

/// Tunables for segment creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShmConfig {
    pub max_create_attempts: u32,
    pub mode: u32,
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            max_create_attempts: DEFAULT_MAX_CREATE_ATTEMPTS,
            mode: DEFAULT_CREATE_MODE,
        }
    }
}

/// A segment to allocate: `pattern` may contain one `*` wildcard.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentConfig {
    pub pattern: String,
    pub size: u64,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        debug!(
            "Loaded {} with {} segment(s)",
            path.display(),
            config.segment.len()
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_deserialize() {
        let toml_str = r#"
[general]
log_level = "debug"

[shm]
max_create_attempts = 50
mode = 0o640

[[segment]]
pattern = "probe-*.shm"
size = 4096

[[segment]]
pattern = "graphics-*"
size = 1048576
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.shm.max_create_attempts, 50);
        assert_eq!(config.shm.mode, 0o640);
        assert_eq!(config.segment.len(), 2);
        assert_eq!(config.segment[0].pattern, "probe-*.shm");
        assert_eq!(config.segment[1].size, 1024 * 1024);
    }

    #[test]
    fn test_shm_section_defaults() {
        let toml_str = r#"
[general]
log_level = "info"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.shm, ShmConfig::default());
        assert_eq!(config.shm.max_create_attempts, DEFAULT_MAX_CREATE_ATTEMPTS);
        assert_eq!(config.shm.mode, 0o600);
        assert!(config.segment.is_empty());
    }

    #[test]
    fn test_partial_shm_section() {
        let toml_str = r#"
[general]
log_level = "info"

[shm]
mode = 0o644
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.shm.mode, 0o644);
        assert_eq!(config.shm.max_create_attempts, DEFAULT_MAX_CREATE_ATTEMPTS);
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
