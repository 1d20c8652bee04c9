/// Source tree discovery
use anyhow::{Context, Result};
use glob::Pattern;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use super::language::SourceFile;
use super::paths;
use crate::config::BoosterConfig;
use crate::logging::services;

/// Walk the source root and collect every file of an enabled language,
/// skipping the cache root and excluded patterns. Paths are project-relative
/// and sorted.
pub fn discover_sources(project_root: &Path, config: &BoosterConfig) -> Result<Vec<SourceFile>> {
    let source_root = project_root.join(config.source_root());
    let cache_root = paths::normalize(&config.cache_root());
    let excludes = config
        .paths
        .exclude
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).with_context(|| format!("Invalid exclude pattern: {}", pattern))
        })
        .collect::<Result<Vec<_>>>()?;

    let is_excluded = |relative: &Path| {
        relative.starts_with(&cache_root)
            || excludes
                .iter()
                .any(|pattern| pattern.matches_path(relative))
    };

    let mut sources = Vec::new();
    let walker = WalkDir::new(&source_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            paths::relative_to(project_root, entry.path())
                .map(|relative| relative.as_os_str().is_empty() || !is_excluded(&relative))
                .unwrap_or(false)
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", source_root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(relative) = paths::relative_to(project_root, entry.path()) else {
            continue;
        };
        let Some(language) = config.languages.language_of(&relative) else {
            continue;
        };
        let modified = entry
            .metadata()
            .with_context(|| format!("Failed to stat {}", entry.path().display()))?
            .modified()
            .with_context(|| format!("Failed to read mtime of {}", entry.path().display()))?;
        sources.push(SourceFile::new(relative, language, modified));
    }

    sources.sort_by(|a, b| a.path.cmp(&b.path));

    debug!(
        service = services::GRAPH,
        operation = "discover",
        root = %source_root.display(),
        count = sources.len(),
        "discovered sources"
    );

    Ok(sources)
}
