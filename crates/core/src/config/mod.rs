//! Configuration for Rankguard
//!
//! The engine reads one TOML file, `configs/rankguard.toml`, resolved under
//! the base directory (see [`rankguard_base_dir`]). Missing fields take their
//! defaults, and a missing file is created with defaults on first load.
//!
//! # Example
//!
//! ```ignore
//! use rankguard_core::EngineConfig;
//!
//! let config = EngineConfig::load().unwrap_or_default();
//! println!("Sweeping every {:?}", config.sweep_interval());
//! ```

mod loader;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use loader::{
    config_path, configs_dir, configs_dir_in, rankguard_base_dir, CONFIG_FILE_NAME, HOME_ENV,
};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Could not determine the base directory
    #[error("Config directory not available - set {} or run from a readable directory", HOME_ENV)]
    NoConfigDirectory,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Engine configuration.
///
/// Loaded from `{base}/configs/rankguard.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// Seconds between expiry sweeps
    pub sweep_interval_secs: u64,

    /// Load every group from storage at startup
    pub warm_cache_on_start: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            sweep_interval_secs: 5,
            warm_cache_on_start: true,
        }
    }
}

impl EngineConfig {
    /// Sweep period; never shorter than one second
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Load config from file, creating default if missing.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&config_path()?)
    }

    /// Save config to file.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&config_path()?)
    }

    /// Reload config from file.
    pub fn reload(&mut self) -> ConfigResult<()> {
        let path = config_path()?;
        let content = std::fs::read_to_string(&path)?;
        *self = toml::from_str(&content)?;
        tracing::debug!("Reloaded config from {:?}", path);
        Ok(())
    }

    /// Load config from an explicit path, creating default if missing.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!("Loaded config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save_to(path)?;
            tracing::info!("Created default config at {:?}", path);
            Ok(default)
        }
    }

    /// Save config to an explicit path.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join("rankguard-config-tests")
            .join(format!("{}-{}", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.version, 1);
        assert!(!config.debug);
        assert_eq!(config.sweep_interval_secs, 5);
        assert!(config.warm_cache_on_start);
    }

    #[test]
    fn test_engine_config_serialize() {
        let config = EngineConfig {
            version: 2,
            debug: true,
            ..Default::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("version = 2"));
        assert!(toml_str.contains("debug = true"));
        assert!(toml_str.contains("sweep_interval_secs = 5"));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: EngineConfig = toml::from_str("debug = true").unwrap();
        assert!(config.debug);
        assert_eq!(config.sweep_interval_secs, 5);
        assert!(config.warm_cache_on_start);
    }

    #[test]
    fn test_sweep_interval_floor() {
        let config = EngineConfig {
            sweep_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_from_creates_default() {
        let dir = scratch_dir("create");
        let path = dir.join("configs").join(CONFIG_FILE_NAME);

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_then_load_from() {
        let dir = scratch_dir("save");
        let path = dir.join(CONFIG_FILE_NAME);
        let config = EngineConfig {
            debug: true,
            sweep_interval_secs: 30,
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(EngineConfig::load_from(&path).unwrap(), config);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_from_rejects_invalid_toml() {
        let dir = scratch_dir("invalid");
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&path, "sweep_interval_secs = \"often\"").unwrap();

        assert!(matches!(
            EngineConfig::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
