/// Context store
///
/// Derived facts about a source file live as timestamped marker files in a
/// mirror tree under the cache root: `<cache>/<path>.<kind>`. Freshness is
/// never recorded explicitly, it is the marker's mtime compared against the
/// mtimes of its dependencies.
use anyhow::{Context, Result};
use chrono::Utc;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;
use tracing::{debug, warn};

use super::language::SourceFile;
use super::paths;
use super::scanner::ScanRecord;
use crate::logging::services;

/// Prefix of the first line of a `.d` artifact, followed by the JSON scan record
pub const RECORD_HEADER: &str = "# booster-scan ";

/// Kinds of per-file artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// Source context marker
    Sc,
    /// Executable context marker
    Ec,
    /// Declared inputs marker
    Inputs,
    /// Static analysis gatekeeper marker
    Scan,
    /// Test gatekeeper marker
    Test,
    /// Generated dependency edges, also caching the scan record
    Deps,
}

impl ArtifactKind {
    pub const MARKERS: [ArtifactKind; 5] = [
        ArtifactKind::Sc,
        ArtifactKind::Ec,
        ArtifactKind::Inputs,
        ArtifactKind::Scan,
        ArtifactKind::Test,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Sc => "sc",
            ArtifactKind::Ec => "ec",
            ArtifactKind::Inputs => "inputs",
            ArtifactKind::Scan => "scan",
            ArtifactKind::Test => "test",
            ArtifactKind::Deps => "d",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArtifactKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim_start_matches('.') {
            "sc" => Ok(ArtifactKind::Sc),
            "ec" => Ok(ArtifactKind::Ec),
            "inputs" => Ok(ArtifactKind::Inputs),
            "scan" => Ok(ArtifactKind::Scan),
            "test" => Ok(ArtifactKind::Test),
            "d" => Ok(ArtifactKind::Deps),
            other => anyhow::bail!(
                "Unknown artifact kind '{}' (expected sc, ec, inputs, scan, test or d)",
                other
            ),
        }
    }
}

/// Result of writing a `.d` artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepsWrite {
    Written,
    /// Same content; only the mtime moved so the cached record stays valid
    Touched,
    Unchanged,
}

/// Marker storage rooted at `<project>/<cache_root>`
#[derive(Debug, Clone)]
pub struct ContextStore {
    project_root: PathBuf,
    cache_root: PathBuf,
}

impl ContextStore {
    /// `cache_root` is relative to `project_root`
    pub fn new(project_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            cache_root: paths::normalize(&cache_root.into()),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Project-relative artifact path, e.g. `deps/bbb.py.sc`
    pub fn artifact(&self, source: &Path, kind: ArtifactKind) -> PathBuf {
        let mut name = source.as_os_str().to_os_string();
        name.push(".");
        name.push(kind.extension());
        self.cache_root.join(name)
    }

    pub fn absolute(&self, relative: &Path) -> PathBuf {
        self.project_root.join(relative)
    }

    /// Modification time of a project-relative path, None if it does not exist
    pub fn modified(&self, relative: &Path) -> Option<SystemTime> {
        fs::metadata(self.absolute(relative))
            .and_then(|meta| meta.modified())
            .ok()
    }

    /// Create or refresh a marker. The marker is replaced atomically, so a
    /// concurrent reader sees either the old or the new file.
    pub fn mark_fresh(&self, source: &Path, kind: ArtifactKind) -> Result<PathBuf> {
        let relative = self.artifact(source, kind);
        let content = format!("{}\n", Utc::now().to_rfc3339());
        self.write_atomic(&relative, content.as_bytes())?;

        debug!(
            service = services::STORE,
            operation = "mark",
            status = "success",
            path = %relative.display(),
            "marker refreshed"
        );

        Ok(relative)
    }

    /// Cached scan record, valid while the `.d` artifact is not older than the source
    pub fn load_record(&self, source: &SourceFile) -> Option<ScanRecord> {
        let relative = self.artifact(&source.path, ArtifactKind::Deps);
        let written = self.modified(&relative)?;
        if written < source.modified {
            return None;
        }

        let content = fs::read_to_string(self.absolute(&relative)).ok()?;
        let header = content.lines().next()?.strip_prefix(RECORD_HEADER)?;
        match serde_json::from_str(header) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    service = services::STORE,
                    operation = "load",
                    status = "error",
                    path = %relative.display(),
                    "ignoring unreadable scan record: {}",
                    e
                );
                None
            }
        }
    }

    /// Write a `.d` artifact only when its content changed
    pub fn write_deps(&self, source: &Path, content: &str) -> Result<DepsWrite> {
        let relative = self.artifact(source, ArtifactKind::Deps);
        let absolute = self.absolute(&relative);

        if let Ok(existing) = fs::read_to_string(&absolute) {
            if existing == content {
                let source_modified = self.modified(source);
                let written = self.modified(&relative);
                if matches!((source_modified, written), (Some(s), Some(w)) if w < s) {
                    let file = fs::File::options()
                        .write(true)
                        .open(&absolute)
                        .with_context(|| format!("Failed to open {}", absolute.display()))?;
                    file.set_modified(SystemTime::now())
                        .with_context(|| format!("Failed to touch {}", absolute.display()))?;
                    return Ok(DepsWrite::Touched);
                }
                return Ok(DepsWrite::Unchanged);
            }
        }

        self.write_atomic(&relative, content.as_bytes())?;
        Ok(DepsWrite::Written)
    }

    /// Remove a marker if present
    pub fn invalidate(&self, source: &Path, kind: ArtifactKind) -> Result<bool> {
        let absolute = self.absolute(&self.artifact(source, kind));
        match fs::remove_file(&absolute) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove {}", absolute.display()))
            }
        }
    }

    fn write_atomic(&self, relative: &Path, content: &[u8]) -> Result<()> {
        let absolute = self.absolute(relative);
        let parent = absolute
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Artifact has no parent directory: {}", absolute.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;
        temp.write_all(content)
            .with_context(|| format!("Failed to write {}", absolute.display()))?;
        temp.persist(&absolute)
            .with_context(|| format!("Failed to persist {}", absolute.display()))?;
        Ok(())
    }
}
