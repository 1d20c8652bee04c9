/// A project: configuration bound to a root directory
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use super::discover::discover_sources;
use super::graph::{DepGraph, GraphBuilder};
use super::grouped::{GroupedTarget, HealOutcome};
use super::makefile;
use super::paths;
use super::scanner::Scanner;
use super::store::{ContextStore, DepsWrite};
use crate::config::BoosterConfig;
use crate::logging::services;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepsSummary {
    pub written: usize,
    pub touched: usize,
    pub unchanged: usize,
}

pub struct Project {
    root: PathBuf,
    config: BoosterConfig,
    store: ContextStore,
    scanner: Scanner,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>, config: BoosterConfig) -> Self {
        let root = root.into();
        let store = ContextStore::new(&root, config.cache_root());
        let mut search_dirs = vec![config.source_root()];
        search_dirs.extend(config.paths.python_path.iter().map(PathBuf::from));
        let scanner = Scanner::new(&root, search_dirs);
        Self {
            root,
            config,
            store,
            scanner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &BoosterConfig {
        &self.config
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub fn strict(&self) -> bool {
        self.config.checks.strict_scan
    }

    /// Turn a user-supplied path (relative to the working directory or
    /// absolute) into a project-relative one
    pub fn relative(&self, path: &Path) -> Result<PathBuf> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        };
        paths::relative_to(&self.root, &absolute)
            .filter(|relative| !relative.as_os_str().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "{} is outside the project at {}",
                    path.display(),
                    self.root.display()
                )
            })
    }

    pub fn groups(&self) -> Vec<GroupedTarget> {
        self.config.groups.iter().map(GroupedTarget::from).collect()
    }

    /// Delete the sentinel of every group with a missing output
    pub fn heal_groups(&self) -> Result<Vec<(PathBuf, HealOutcome)>> {
        self.groups()
            .into_iter()
            .map(|group| {
                let outcome = group.heal(&self.root)?;
                Ok((group.sentinel, outcome))
            })
            .collect()
    }

    /// Whole-project graph: heal groups, discover sources, scan what changed
    pub fn build_graph(&self) -> Result<DepGraph> {
        self.heal_groups()?;
        let sources = discover_sources(&self.root, &self.config)?;

        let mut builder = self.builder();
        builder.add_sources(&sources)?;
        for group in self.groups() {
            builder.add_group(group)?;
        }
        Ok(builder.finish())
    }

    /// Graph restricted to the given sources and what they import
    pub fn build_graph_for(&self, sources: &[PathBuf]) -> Result<DepGraph> {
        let mut builder = self.builder();
        for source in sources {
            builder.add_source(source)?;
        }
        Ok(builder.finish())
    }

    fn builder(&self) -> GraphBuilder<'_> {
        GraphBuilder::new(
            &self.scanner,
            &self.store,
            &self.config.languages,
            self.strict(),
        )
    }

    /// Write the `.d` fragment of one source
    pub fn write_deps_for(&self, graph: &DepGraph, source: &Path) -> Result<DepsWrite> {
        let content = makefile::render_deps(graph, &self.store, source)
            .ok_or_else(|| anyhow::anyhow!("{} is not a source file", source.display()))?;
        self.store.write_deps(source, &content)
    }

    /// Write the `.d` fragment of every source in the graph
    pub fn write_deps(&self, graph: &DepGraph) -> Result<DepsSummary> {
        let mut summary = DepsSummary::default();
        for source in graph.sources() {
            match self.write_deps_for(graph, source)? {
                DepsWrite::Written => summary.written += 1,
                DepsWrite::Touched => summary.touched += 1,
                DepsWrite::Unchanged => summary.unchanged += 1,
            }
        }

        info!(
            service = services::GRAPH,
            operation = "write",
            written = summary.written,
            touched = summary.touched,
            unchanged = summary.unchanged,
            "dependency fragments updated"
        );
        Ok(summary)
    }

    /// Prelude for the pipeline's Makefile
    pub fn prelude(&self, graph: &DepGraph, booster: Option<String>) -> String {
        makefile::render_prelude(
            graph,
            &self.store,
            &makefile::PreludeOptions {
                booster,
                keep_corrupt_output: self.config.checks.keep_corrupt_output,
            },
        )
    }
}
