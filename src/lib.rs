// Library interface for Booster
// This allows integration tests and external code to use Booster's modules

pub mod cli;
pub mod cli_utils;
pub mod commands;
pub mod config;
pub mod config_discovery;
pub mod logging;
pub mod script;

// Re-export commonly used types
pub use config::BoosterConfig;
pub use config_discovery::{discover_config, load_config_with_discovery, LoadedConfig};
pub use script::{ContextStore, DepGraph, Project};
