//! Config path resolution
//!
//! The base directory comes from `RANKGUARD_HOME`, falling back to the
//! process working directory.

use std::path::{Path, PathBuf};

use super::{ConfigError, ConfigResult};

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "RANKGUARD_HOME";

/// File name of the engine config
pub const CONFIG_FILE_NAME: &str = "rankguard.toml";

/// Returns the rankguard base directory.
pub fn rankguard_base_dir() -> ConfigResult<PathBuf> {
    match std::env::var_os(HOME_ENV) {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => std::env::current_dir().map_err(|_| ConfigError::NoConfigDirectory),
    }
}

/// Returns the configs directory under `base`.
///
/// Path: `{base}/configs/`
pub fn configs_dir_in(base: &Path) -> PathBuf {
    base.join("configs")
}

/// Returns the base configs directory.
pub fn configs_dir() -> ConfigResult<PathBuf> {
    Ok(configs_dir_in(&rankguard_base_dir()?))
}

/// Returns the engine config path.
///
/// Path: `{base}/configs/rankguard.toml`
pub fn config_path() -> ConfigResult<PathBuf> {
    Ok(configs_dir()?.join(CONFIG_FILE_NAME))
}
