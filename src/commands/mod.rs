pub mod check;
pub mod config;
pub mod context;
pub mod deps;
pub mod exec;
pub mod graph;
pub mod heal;
pub mod makefile;
pub mod mark;
pub mod uses;

use anyhow::Result;
use tracing::debug;

use crate::cli::CommonConfigArgs;
use crate::config::BoosterConfig;
use crate::config_discovery::{load_config_with_discovery, LoadedConfig};
use crate::script::Project;

/// Discover the configuration, apply command-line overrides and validate it
pub fn load_config(common: &CommonConfigArgs) -> Result<LoadedConfig> {
    let mut loaded = load_config_with_discovery(common.config.as_deref())?;
    loaded.config.apply_overrides(
        common.source_root.as_deref(),
        common.cache_root.as_deref(),
        common.strict,
    );
    loaded.config.validate()?;
    Ok(loaded)
}

pub fn load_project(common: &CommonConfigArgs) -> Result<Project> {
    let LoadedConfig {
        config,
        path,
        project_root,
    } = load_config(common)?;
    debug!(
        project_root = %project_root.display(),
        config = ?path,
        "loaded project"
    );
    Ok(Project::new(project_root, config))
}

/// Configuration for commands that still work without a valid project
pub fn load_config_or_default(common: &CommonConfigArgs) -> BoosterConfig {
    load_config(common)
        .map(|loaded| loaded.config)
        .unwrap_or_default()
}
