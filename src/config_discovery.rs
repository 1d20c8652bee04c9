use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::BoosterConfig;

pub const CONFIG_FILE_NAME: &str = "booster.toml";

/// Discovers Booster configuration by traversing up the directory tree
pub fn discover_config(start_dir: &Path) -> Result<Option<PathBuf>> {
    if let Some(local) = discover_project_config(start_dir) {
        return Ok(Some(local));
    }

    // Fallback to global config
    if let Some(global) = global_config_path() {
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}

/// Nearest `booster.toml` at or above `start_dir`
pub fn discover_project_config(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|path| path.is_file())
}

/// `~/.config/booster/config.toml`
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config/booster/config.toml"))
}

/// Configuration together with where it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BoosterConfig,
    /// File the configuration was read from, None for defaults
    pub path: Option<PathBuf>,
    /// Directory all configured paths are relative to
    pub project_root: PathBuf,
}

/// Loads configuration with auto-discovery support
///
/// If `explicit_path` is provided, loads config from that path and uses its
/// directory as the project root. Otherwise the nearest `booster.toml` above
/// the working directory decides the root; a global config or the defaults
/// apply to the working directory itself.
pub fn load_config_with_discovery(explicit_path: Option<&str>) -> Result<LoadedConfig> {
    let current_dir =
        std::env::current_dir().context("Failed to get current directory for config discovery")?;
    load_config_from(&current_dir, explicit_path)
}

pub fn load_config_from(current_dir: &Path, explicit_path: Option<&str>) -> Result<LoadedConfig> {
    if let Some(config_path) = explicit_path {
        let path = current_dir.join(config_path);
        let config = BoosterConfig::from_file(&path)?;
        let project_root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| current_dir.to_path_buf());
        return Ok(LoadedConfig {
            config,
            path: Some(path),
            project_root,
        });
    }

    match discover_config(current_dir)? {
        Some(path) => {
            info!("Using config: {}", path.display());
            let config = BoosterConfig::from_file(&path)?;
            let is_global = global_config_path().as_deref() == Some(path.as_path());
            let project_root = match path.parent() {
                Some(parent) if !is_global => parent.to_path_buf(),
                _ => current_dir.to_path_buf(),
            };
            Ok(LoadedConfig {
                config,
                path: Some(path),
                project_root,
            })
        }
        None => {
            debug!("No configuration file found, using defaults");
            Ok(LoadedConfig {
                config: BoosterConfig::default(),
                path: None,
                project_root: current_dir.to_path_buf(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discovers_nearest_config_upwards() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[paths]\ncache_root = \"build/deps\"\n",
        )
        .unwrap();
        let nested = temp.path().join("scripts/stage1");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            discover_project_config(&nested),
            Some(temp.path().join(CONFIG_FILE_NAME))
        );

        let loaded = load_config_from(&nested, None).unwrap();
        assert_eq!(loaded.project_root, temp.path());
        assert_eq!(loaded.config.paths.cache_root, "build/deps");
    }

    #[test]
    fn test_explicit_config_sets_project_root() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pipeline");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("custom.toml"), "[checks]\nstrict_scan = true\n").unwrap();

        let loaded = load_config_from(temp.path(), Some("pipeline/custom.toml")).unwrap();
        assert_eq!(loaded.project_root, dir);
        assert!(loaded.config.checks.strict_scan);
    }

    #[test]
    fn test_invalid_config_is_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE_NAME), "[paths\n").unwrap();

        assert!(load_config_from(temp.path(), None).is_err());
    }
}
