/// Dependency graph
///
/// An explicit in-memory graph of build rules keyed by path. Every source file
/// contributes rules for its context markers and gatekeepers; grouped targets
/// contribute rules for their outputs and sentinel. The graph is rendered for
/// make by `makefile` and evaluated in-process by `freshness`.
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::grouped::GroupedTarget;
use super::language::SourceFile;
use super::scanner::{ScanRecord, Scanner};
use super::store::{ArtifactKind, ContextStore};
use super::uses;
use crate::config::{AnalysisDepth, LanguagesConfig};
use crate::logging::services;

/// A node of the graph: a plain project file or an artifact of a source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    File(PathBuf),
    Artifact(ArtifactKind, PathBuf),
}

impl Node {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Node::File(path.into())
    }

    pub fn artifact(kind: ArtifactKind, source: impl Into<PathBuf>) -> Self {
        Node::Artifact(kind, source.into())
    }

    /// Project-relative path of the node on disk
    pub fn path(&self, store: &ContextStore) -> PathBuf {
        match self {
            Node::File(path) => path.clone(),
            Node::Artifact(kind, source) => store.artifact(source, *kind),
        }
    }
}

/// How a target is brought up to date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Context marker, refreshed by touching it
    Mark,
    /// Gatekeeper, refreshed by a successful tool run
    Check,
    /// Produced by a pipeline command
    Command(Option<String>),
    /// Produced as a side effect of its only dependency
    SideEffect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub deps: Vec<Node>,
    pub action: Action,
}

/// Whole-project graph with read-only context queries
#[derive(Debug, Clone, Default)]
pub struct DepGraph {
    rules: BTreeMap<Node, Rule>,
    records: BTreeMap<PathBuf, ScanRecord>,
    groups: Vec<GroupedTarget>,
    strict: bool,
}

impl DepGraph {
    pub fn rule(&self, node: &Node) -> Option<&Rule> {
        self.rules.get(node)
    }

    pub fn rules(&self) -> impl Iterator<Item = (&Node, &Rule)> {
        self.rules.iter()
    }

    pub fn record(&self, source: &Path) -> Option<&ScanRecord> {
        self.records.get(source)
    }

    /// Every source file in the graph, sorted
    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        self.records.keys().map(PathBuf::as_path)
    }

    pub fn groups(&self) -> &[GroupedTarget] {
        &self.groups
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Rules owned by one source file, in artifact order
    pub fn rules_for(&self, source: &Path) -> Vec<(Node, &Rule)> {
        ArtifactKind::MARKERS
            .into_iter()
            .filter_map(|kind| {
                let node = Node::artifact(kind, source);
                let rule = self.rules.get(&node)?;
                Some((node, rule))
            })
            .collect()
    }

    /// Files with tests, in path order
    pub fn test_sources(&self) -> Vec<PathBuf> {
        self.records
            .iter()
            .filter(|(_, record)| record.has_tests)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// SC(f): f plus the source contexts of everything it imports
    pub fn source_context(&self, source: &Path) -> BTreeSet<PathBuf> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([source.to_path_buf()]);
        while let Some(path) = queue.pop_front() {
            if !seen.insert(path.clone()) {
                continue;
            }
            if let Some(record) = self.records.get(&path) {
                queue.extend(record.imports.iter().cloned());
            }
        }
        seen
    }

    /// EC(f): SC(f) plus every input declared by a member of SC(f)
    pub fn executable_context(&self, source: &Path) -> BTreeSet<PathBuf> {
        let context = self.source_context(source);
        let inputs: Vec<PathBuf> = context
            .iter()
            .filter_map(|path| self.records.get(path))
            .flat_map(|record| record.inputs.iter().cloned())
            .collect();
        context.into_iter().chain(inputs).collect()
    }

    /// Dependencies of a step running `script`
    pub fn uses(&self, script: &str) -> Vec<Node> {
        uses::uses(script, self.strict)
    }
}

/// Builds a `DepGraph`, scanning each source at most once and reusing cached
/// scan records whose `.d` artifact is still current.
pub struct GraphBuilder<'a> {
    scanner: &'a Scanner,
    store: &'a ContextStore,
    languages: &'a LanguagesConfig,
    strict: bool,
    graph: DepGraph,
    scanned: BTreeSet<PathBuf>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        scanner: &'a Scanner,
        store: &'a ContextStore,
        languages: &'a LanguagesConfig,
        strict: bool,
    ) -> Self {
        Self {
            scanner,
            store,
            languages,
            strict,
            graph: DepGraph {
                strict,
                ..Default::default()
            },
            scanned: BTreeSet::new(),
        }
    }

    /// Add a source file and, transitively, everything it imports
    pub fn add_source(&mut self, source: &Path) -> Result<()> {
        let mut queue = VecDeque::from([source.to_path_buf()]);
        while let Some(path) = queue.pop_front() {
            if self.graph.records.contains_key(&path) {
                continue;
            }
            let record = self.record_for(&path)?;
            queue.extend(record.imports.iter().cloned());
            self.add_rules(&path, &record);
            self.graph.records.insert(path, record);
        }
        Ok(())
    }

    pub fn add_sources<'s>(&mut self, sources: impl IntoIterator<Item = &'s SourceFile>) -> Result<()> {
        for source in sources {
            self.add_source(&source.path)?;
        }
        Ok(())
    }

    /// Add a grouped target; the scripts it uses join the graph too
    pub fn add_group(&mut self, group: GroupedTarget) -> Result<()> {
        for script in &group.uses {
            if self.store.absolute(script).is_file() {
                self.add_source(script)?;
            }
        }
        for (node, rule) in group.rules(self.strict) {
            self.graph.rules.insert(node, rule);
        }
        self.graph.groups.push(group);
        Ok(())
    }

    pub fn finish(self) -> DepGraph {
        info!(
            service = services::GRAPH,
            operation = "build",
            status = "success",
            sources = self.graph.records.len(),
            scanned = self.scanned.len(),
            rules = self.graph.rules.len(),
            "dependency graph built"
        );
        self.graph
    }

    fn record_for(&mut self, path: &Path) -> Result<ScanRecord> {
        let Some(language) = self.languages.language_of(path) else {
            // Imported file of a disabled language: a leaf without edges
            return Ok(ScanRecord::default());
        };

        let modified = self
            .store
            .modified(path)
            .with_context(|| format!("Source file not found: {}", path.display()))?;
        let source = SourceFile::new(path, language, modified);

        if let Some(record) = self.store.load_record(&source) {
            debug!(
                service = services::GRAPH,
                operation = "load",
                status = "hit",
                path = %path.display(),
                "reusing scan record"
            );
            return Ok(record);
        }

        let record = self.scanner.scan(&source)?;
        self.scanned.insert(path.to_path_buf());
        Ok(record)
    }

    fn add_rules(&mut self, path: &Path, record: &ScanRecord) {
        let file = Node::file(path);
        let rules = &mut self.graph.rules;

        let mut sc = vec![file.clone()];
        sc.extend(
            record
                .imports
                .iter()
                .map(|import| Node::artifact(ArtifactKind::Sc, import)),
        );
        rules.insert(
            Node::artifact(ArtifactKind::Sc, path),
            Rule {
                deps: sc,
                action: Action::Mark,
            },
        );

        let mut ec = vec![file.clone()];
        ec.extend(
            record
                .imports
                .iter()
                .map(|import| Node::artifact(ArtifactKind::Ec, import)),
        );
        if !record.inputs.is_empty() {
            ec.push(Node::artifact(ArtifactKind::Inputs, path));
            rules.insert(
                Node::artifact(ArtifactKind::Inputs, path),
                Rule {
                    deps: record.inputs.iter().map(Node::file).collect(),
                    action: Action::Mark,
                },
            );
        }
        rules.insert(
            Node::artifact(ArtifactKind::Ec, path),
            Rule {
                deps: ec,
                action: Action::Mark,
            },
        );

        let scan_unit = match self.languages.language_of(path).map(|language| {
            self.languages.settings(language).depth
        }) {
            Some(AnalysisDepth::Transitive) => Node::artifact(ArtifactKind::Sc, path),
            _ => file,
        };
        rules.insert(
            Node::artifact(ArtifactKind::Scan, path),
            Rule {
                deps: vec![scan_unit],
                action: Action::Check,
            },
        );

        if record.has_tests {
            rules.insert(
                Node::artifact(ArtifactKind::Test, path),
                Rule {
                    deps: vec![Node::artifact(ArtifactKind::Ec, path)],
                    action: Action::Check,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, path: &str, content: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    fn build(root: &Path, sources: &[&str]) -> DepGraph {
        let scanner = Scanner::new(root, vec![PathBuf::from(".")]);
        let store = ContextStore::new(root, "deps");
        let languages = LanguagesConfig::default();
        let mut builder = GraphBuilder::new(&scanner, &store, &languages, false);
        for source in sources {
            builder.add_source(Path::new(source)).unwrap();
        }
        builder.finish()
    }

    fn set(paths: &[&str]) -> BTreeSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_contexts_for_bbb_and_ccc() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "bbb.py", "import ccc\n");
        write(temp.path(), "ccc.py", "INPUTS = ['f.txt']\n");

        let graph = build(temp.path(), &["bbb.py"]);
        assert_eq!(
            graph.source_context(Path::new("bbb.py")),
            set(&["bbb.py", "ccc.py"])
        );
        assert_eq!(
            graph.executable_context(Path::new("bbb.py")),
            set(&["bbb.py", "ccc.py", "f.txt"])
        );
        assert_eq!(
            graph.executable_context(Path::new("ccc.py")),
            set(&["ccc.py", "f.txt"])
        );
    }

    #[test]
    fn test_leaf_contexts_are_the_file_itself() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "leaf.py", "import os\n");

        let graph = build(temp.path(), &["leaf.py"]);
        assert_eq!(graph.source_context(Path::new("leaf.py")), set(&["leaf.py"]));
        assert_eq!(
            graph.executable_context(Path::new("leaf.py")),
            set(&["leaf.py"])
        );
    }

    #[test]
    fn test_edge_rules() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "bbb.py", "import ccc\n");
        write(temp.path(), "ccc.py", "INPUTS = ['f.txt']\ndef test_x():\n    pass\n");

        let graph = build(temp.path(), &["bbb.py"]);

        let ec = graph
            .rule(&Node::artifact(ArtifactKind::Ec, "bbb.py"))
            .unwrap();
        assert_eq!(
            ec.deps,
            vec![
                Node::file("bbb.py"),
                Node::artifact(ArtifactKind::Ec, "ccc.py")
            ]
        );

        let ccc_ec = graph
            .rule(&Node::artifact(ArtifactKind::Ec, "ccc.py"))
            .unwrap();
        assert!(ccc_ec
            .deps
            .contains(&Node::artifact(ArtifactKind::Inputs, "ccc.py")));
        assert!(!ccc_ec
            .deps
            .iter()
            .any(|dep| matches!(dep, Node::Artifact(ArtifactKind::Deps, _))));

        let scan = graph
            .rule(&Node::artifact(ArtifactKind::Scan, "bbb.py"))
            .unwrap();
        assert_eq!(scan.deps, vec![Node::artifact(ArtifactKind::Sc, "bbb.py")]);

        assert!(graph
            .rule(&Node::artifact(ArtifactKind::Test, "bbb.py"))
            .is_none());
        assert_eq!(graph.test_sources(), vec![PathBuf::from("ccc.py")]);
    }

    #[test]
    fn test_cyclic_imports_terminate() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.py", "import b\n");
        write(temp.path(), "b.py", "import a\n");

        let graph = build(temp.path(), &["a.py"]);
        assert_eq!(graph.source_context(Path::new("a.py")), set(&["a.py", "b.py"]));
    }
}
