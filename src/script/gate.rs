/// Gatekeepers: memoized static analysis and tests
///
/// A check runs only when its marker is older than its dependency unit (the
/// file, its SC or its EC). Planning is sequential and refreshes context
/// markers; the checks themselves then run concurrently, each one writing
/// only its own marker.
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{error, info, warn};

use super::executor::{ToolCommand, ToolExecutor};
use super::freshness::Freshness;
use super::graph::{DepGraph, Node};
use super::store::{ArtifactKind, ContextStore};
use crate::config::BoosterConfig;
use crate::logging::services;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Scan,
    Test,
}

impl CheckKind {
    pub fn artifact(self) -> ArtifactKind {
        match self {
            CheckKind::Scan => ArtifactKind::Scan,
            CheckKind::Test => ArtifactKind::Test,
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.artifact().extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Marker already newer than the dependency unit; nothing ran
    Fresh,
    /// Tool exited 0, marker written
    Passed,
    /// Tool disabled in configuration, marker written without running anything
    Disabled,
    /// The file has no such check (e.g. no tests)
    NotApplicable,
    /// Tool exited nonzero or was killed, marker removed
    Failed { exit_code: Option<i32> },
    /// The check could not be planned or started
    Error(String),
}

impl CheckOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, CheckOutcome::Failed { .. } | CheckOutcome::Error(_))
    }

    fn status(&self) -> &'static str {
        match self {
            CheckOutcome::Fresh => "fresh",
            CheckOutcome::Passed => "success",
            CheckOutcome::Disabled => "disabled",
            CheckOutcome::NotApplicable => "skipped",
            CheckOutcome::Failed { .. } => "failed",
            CheckOutcome::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckTask {
    pub source: PathBuf,
    pub kind: CheckKind,
    pub tool: Option<ToolCommand>,
}

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub outcomes: Vec<(PathBuf, CheckOutcome)>,
}

impl CheckReport {
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_success())
    }

    pub fn count(&self, f: impl Fn(&CheckOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, outcome)| f(outcome)).count()
    }

    /// Number of tool processes that actually ran
    pub fn executed(&self) -> usize {
        self.count(|o| matches!(o, CheckOutcome::Passed | CheckOutcome::Failed { .. }))
    }

    pub fn failures(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(path, _)| path.as_path())
            .collect()
    }
}

pub struct Gatekeeper<'a> {
    graph: &'a DepGraph,
    store: &'a ContextStore,
    config: &'a BoosterConfig,
    jobs: usize,
}

impl<'a> Gatekeeper<'a> {
    pub fn new(graph: &'a DepGraph, store: &'a ContextStore, config: &'a BoosterConfig) -> Self {
        Self {
            graph,
            store,
            config,
            jobs: config.checks.effective_jobs(),
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Sources with a `kind` check, in path order
    pub fn all_sources(&self, kind: CheckKind) -> Vec<PathBuf> {
        match kind {
            CheckKind::Scan => self.graph.sources().map(Path::to_path_buf).collect(),
            CheckKind::Test => self.graph.test_sources(),
        }
    }

    fn tool_for(&self, kind: CheckKind, source: &Path) -> Option<ToolCommand> {
        let value = match kind {
            CheckKind::Scan => {
                let language = self.config.languages.language_of(source)?;
                self.config.languages.settings(language).analyzer
            }
            CheckKind::Test => self.config.checks.tester.clone(),
        };
        ToolCommand::parse(&value)
    }

    /// Decide which checks have to run. Outcomes that are already settled
    /// (fresh, not applicable, unplannable) are returned alongside the tasks.
    pub fn plan(
        &self,
        kind: CheckKind,
        sources: &[PathBuf],
        force: bool,
    ) -> (Vec<CheckTask>, Vec<(PathBuf, CheckOutcome)>) {
        let mut freshness = Freshness::new(self.graph, self.store);
        let mut tasks = Vec::new();
        let mut settled = Vec::new();

        for source in sources {
            let node = Node::artifact(kind.artifact(), source);
            let no_language =
                kind == CheckKind::Scan && self.config.languages.language_of(source).is_none();
            if no_language || self.graph.rule(&node).is_none() {
                settled.push((source.clone(), CheckOutcome::NotApplicable));
                continue;
            }

            if !force {
                match freshness.outdated(&node) {
                    Ok(false) => {
                        settled.push((source.clone(), CheckOutcome::Fresh));
                        continue;
                    }
                    Ok(true) => {}
                    Err(e) => {
                        settled.push((source.clone(), CheckOutcome::Error(e.to_string())));
                        continue;
                    }
                }
            }

            tasks.push(CheckTask {
                source: source.clone(),
                kind,
                tool: self.tool_for(kind, source),
            });
        }

        info!(
            service = services::GATE,
            operation = "plan",
            kind = %kind,
            to_run = tasks.len(),
            settled = settled.len(),
            refreshed = freshness.refreshed(),
            "planned checks"
        );

        (tasks, settled)
    }

    /// Run planned checks, at most `jobs` at a time
    pub async fn run(&self, tasks: Vec<CheckTask>) -> Vec<(PathBuf, CheckOutcome)> {
        let semaphore = Arc::new(Semaphore::new(self.jobs.max(1)));
        let executor = ToolExecutor::new(self.store.project_root());
        let mut set = JoinSet::new();
        let mut sources = HashMap::new();

        for task in tasks {
            let semaphore = semaphore.clone();
            let executor = executor.clone();
            let store = self.store.clone();
            let source = task.source.clone();
            let handle = set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => run_task(&executor, &store, &task).await,
                    Err(e) => CheckOutcome::Error(e.to_string()),
                };
                (task.source, outcome)
            });
            sources.insert(handle.id(), source);
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = set.join_next().await {
            outcomes.push(join_outcome(joined, &sources));
        }
        outcomes
    }

    /// Plan and run checks for `sources`
    pub async fn check(&self, kind: CheckKind, sources: &[PathBuf], force: bool) -> CheckReport {
        let (tasks, mut outcomes) = self.plan(kind, sources, force);
        outcomes.extend(self.run(tasks).await);
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        CheckReport { outcomes }
    }
}

/// Attribute a task that panicked or was cancelled to its source file
fn join_outcome(
    joined: Result<(PathBuf, CheckOutcome), JoinError>,
    sources: &HashMap<task::Id, PathBuf>,
) -> (PathBuf, CheckOutcome) {
    match joined {
        Ok(result) => result,
        Err(e) => {
            let source = sources.get(&e.id()).cloned().unwrap_or_default();
            error!(
                service = services::GATE,
                operation = "join",
                path = %source.display(),
                "check task failed: {}",
                e
            );
            (source, CheckOutcome::Error(e.to_string()))
        }
    }
}

async fn run_task(executor: &ToolExecutor, store: &ContextStore, task: &CheckTask) -> CheckOutcome {
    let start = Instant::now();
    let outcome = match &task.tool {
        None => CheckOutcome::Disabled,
        Some(tool) => match executor.run_on(tool, &task.source).await {
            Ok(result) if result.success() => CheckOutcome::Passed,
            Ok(result) => CheckOutcome::Failed {
                exit_code: result.exit_code,
            },
            Err(e) => CheckOutcome::Error(format!("{:#}", e)),
        },
    };

    let outcome = match outcome {
        CheckOutcome::Passed | CheckOutcome::Disabled => {
            match store.mark_fresh(&task.source, task.kind.artifact()) {
                Ok(_) => outcome,
                Err(e) => CheckOutcome::Error(format!("{:#}", e)),
            }
        }
        // A forced run may fail on a file whose marker is still fresh
        CheckOutcome::Failed { .. } => {
            match store.invalidate(&task.source, task.kind.artifact()) {
                Ok(_) => outcome,
                Err(e) => CheckOutcome::Error(format!("{:#}", e)),
            }
        }
        other => other,
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    if outcome.is_success() {
        info!(
            service = services::GATE,
            operation = %task.kind,
            status = outcome.status(),
            path = %task.source.display(),
            duration_ms,
            "check finished"
        );
    } else {
        warn!(
            service = services::GATE,
            operation = %task.kind,
            status = outcome.status(),
            path = %task.source.display(),
            duration_ms,
            "check failed: {:?}",
            outcome
        );
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::graph::GraphBuilder;
    use crate::script::scanner::Scanner;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write_old(root: &Path, path: &str, content: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(&full, content).unwrap();
        let file = fs::File::options().write(true).open(&full).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(600))
            .unwrap();
    }

    fn setup(root: &Path, config: &BoosterConfig) -> (DepGraph, ContextStore) {
        let scanner = Scanner::new(root, vec![PathBuf::from(".")]);
        let store = ContextStore::new(root, "deps");
        let mut builder = GraphBuilder::new(&scanner, &store, &config.languages, false);
        builder.add_source(Path::new("bbb.py")).unwrap();
        (builder.finish(), store)
    }

    #[tokio::test]
    async fn test_disabled_tool_marks_without_running() {
        let temp = TempDir::new().unwrap();
        write_old(temp.path(), "bbb.py", "import ccc\n");
        write_old(temp.path(), "ccc.py", "def test_a():\n    pass\n");

        let mut config = BoosterConfig::default();
        config.languages.python.analyzer = Some("off".to_string());
        config.checks.tester = "true".to_string();
        let (graph, store) = setup(temp.path(), &config);
        let gate = Gatekeeper::new(&graph, &store, &config).with_jobs(2);

        let sources = gate.all_sources(CheckKind::Scan);
        let report = gate.check(CheckKind::Scan, &sources, false).await;
        assert!(report.success());
        assert_eq!(report.count(|o| *o == CheckOutcome::Disabled), 2);
        assert_eq!(report.executed(), 0);

        let again = gate.check(CheckKind::Scan, &sources, false).await;
        assert_eq!(again.count(|o| *o == CheckOutcome::Fresh), 2);

        let tests = gate
            .check(CheckKind::Test, &[PathBuf::from("bbb.py"), PathBuf::from("ccc.py")], false)
            .await;
        assert_eq!(
            tests.outcomes,
            vec![
                (PathBuf::from("bbb.py"), CheckOutcome::NotApplicable),
                (PathBuf::from("ccc.py"), CheckOutcome::Disabled),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_check_withholds_marker() {
        let temp = TempDir::new().unwrap();
        write_old(temp.path(), "bbb.py", "");
        write_old(temp.path(), "fail.sh", "exit 1\n");

        let mut config = BoosterConfig::default();
        config.languages.python.analyzer = Some("sh fail.sh".to_string());
        let (graph, store) = setup(temp.path(), &config);
        let gate = Gatekeeper::new(&graph, &store, &config);

        let report = gate
            .check(CheckKind::Scan, &[PathBuf::from("bbb.py")], false)
            .await;
        assert!(!report.success());
        assert_eq!(report.failures(), vec![Path::new("bbb.py")]);
        assert!(store
            .modified(&store.artifact(Path::new("bbb.py"), ArtifactKind::Scan))
            .is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_forced_failure_removes_fresh_marker() {
        let temp = TempDir::new().unwrap();
        write_old(temp.path(), "bbb.py", "");
        write_old(temp.path(), "fail.sh", "exit 2\n");

        let mut config = BoosterConfig::default();
        config.languages.python.analyzer = Some("sh fail.sh".to_string());
        let (graph, store) = setup(temp.path(), &config);
        let marker = store.mark_fresh(Path::new("bbb.py"), ArtifactKind::Scan).unwrap();

        let gate = Gatekeeper::new(&graph, &store, &config);
        let report = gate
            .check(CheckKind::Scan, &[PathBuf::from("bbb.py")], true)
            .await;
        assert_eq!(
            report.outcomes,
            vec![(PathBuf::from("bbb.py"), CheckOutcome::Failed { exit_code: Some(2) })]
        );
        assert!(store.modified(&marker).is_none());
    }

    #[tokio::test]
    async fn test_scan_of_file_without_language_is_not_applicable() {
        let temp = TempDir::new().unwrap();
        write_old(temp.path(), "notes.txt", "remember the milk\n");

        let config = BoosterConfig::default();
        let scanner = Scanner::new(temp.path(), vec![PathBuf::from(".")]);
        let store = ContextStore::new(temp.path(), "deps");
        let mut builder = GraphBuilder::new(&scanner, &store, &config.languages, false);
        builder.add_source(Path::new("notes.txt")).unwrap();
        let graph = builder.finish();

        let gate = Gatekeeper::new(&graph, &store, &config);
        let report = gate
            .check(CheckKind::Scan, &[PathBuf::from("notes.txt")], true)
            .await;
        assert_eq!(
            report.outcomes,
            vec![(PathBuf::from("notes.txt"), CheckOutcome::NotApplicable)]
        );
        assert!(store
            .modified(&store.artifact(Path::new("notes.txt"), ArtifactKind::Scan))
            .is_none());
    }

    #[tokio::test]
    async fn test_panicked_check_keeps_its_source() {
        let mut set = JoinSet::new();
        let handle = set.spawn(async {
            if true {
                panic!("analyzer wrapper crashed");
            }
            (PathBuf::from("unused.py"), CheckOutcome::Passed)
        });
        let sources = HashMap::from([(handle.id(), PathBuf::from("bbb.py"))]);

        let joined = set.join_next().await.unwrap();
        let (source, outcome) = join_outcome(joined, &sources);
        assert_eq!(source, PathBuf::from("bbb.py"));
        match outcome {
            CheckOutcome::Error(message) => assert!(message.contains("panicked")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
