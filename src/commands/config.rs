use anyhow::{Context, Result};
use std::fs;
use tracing::info;

use crate::cli::{CommonConfigArgs, ConfigCommands};
use crate::cli_utils::booster_prefix;
use crate::config::BoosterConfig;
use crate::config_discovery::LoadedConfig;
use crate::script::Language;

pub fn run(common: &CommonConfigArgs, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Validate { path } => validate(common, path),
        ConfigCommands::Generate { output } => generate(output),
        ConfigCommands::Show => show(common),
    }
}

fn validate(common: &CommonConfigArgs, path: Option<String>) -> Result<()> {
    let (config, source) = match path {
        Some(path) => {
            info!("Validating config file: {}", path);
            let config = BoosterConfig::from_file(&path)?;
            config.validate()?;
            (config, path)
        }
        None => {
            let LoadedConfig { config, path, .. } = super::load_config(common)?;
            let source = path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "defaults".to_string());
            (config, source)
        }
    };

    println!("✓ Configuration is valid: {}", source);
    println!("\nSummary:");
    println!("  - Source root: {}", config.paths.source_root);
    println!("  - Cache root: {}", config.paths.cache_root);
    for language in Language::ALL {
        let settings = config.languages.settings(language);
        if settings.enabled {
            println!(
                "  - {}: .{} (analyzer: {}, depth: {:?})",
                language,
                settings.extensions.join(", ."),
                settings.analyzer,
                settings.depth
            );
        }
    }
    println!("  - Tester: {}", config.checks.tester);
    println!("  - Strict scan: {}", config.checks.strict_scan);
    println!("  - Grouped targets: {}", config.groups.len());

    for (i, group) in config.groups.iter().enumerate() {
        println!(
            "    {}. {} ({} outputs)",
            i + 1,
            group.sentinel,
            group.outputs.len()
        );
    }

    Ok(())
}

fn generate(output: Option<String>) -> Result<()> {
    let config_toml = BoosterConfig::example()?;

    match output {
        Some(path) => {
            fs::write(&path, &config_toml)
                .with_context(|| format!("Failed to write {}", path))?;
            eprintln!("{} Wrote {}", booster_prefix(), path);
        }
        None => println!("{}", config_toml),
    }

    Ok(())
}

fn show(common: &CommonConfigArgs) -> Result<()> {
    let LoadedConfig {
        config,
        project_root,
        ..
    } = super::load_config(common)?;

    println!("# Project root: {}\n", project_root.display());
    println!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}
