/// Static dependency scanner
///
/// Reads one source file and extracts the project-local files it imports, the
/// fixed paths it declares through `INPUTS`, and whether it defines tests.
/// Nothing in the scanned file is ever executed.
pub mod literal;
pub mod python;
pub mod shell;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::language::{Language, SourceFile};
use super::paths;
use crate::logging::services;

/// Hard scanner failures. Any of these aborts the whole graph computation.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("{}: failed to read source: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}:{line}: cannot evaluate INPUTS: {message}", .path.display())]
    Inputs {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// What the scanner learned about one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Project-relative files imported directly, in source order
    #[serde(default)]
    pub imports: Vec<PathBuf>,
    /// Project-relative paths declared in `INPUTS`
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    #[serde(default)]
    pub has_tests: bool,
}

/// Scanner bound to one project tree
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    search_dirs: Vec<PathBuf>,
}

impl Scanner {
    /// `root` is the absolute project root; `search_dirs` are project-relative
    /// directories searched for absolute imports after the importer's own directory.
    pub fn new(root: impl Into<PathBuf>, search_dirs: Vec<PathBuf>) -> Self {
        let root = root.into();
        let search_dirs = search_dirs.iter().map(|dir| root.join(dir)).collect();
        Self { root, search_dirs }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    pub fn scan(&self, file: &SourceFile) -> Result<ScanRecord, ScanError> {
        let absolute = self.root.join(&file.path);
        let content = fs::read_to_string(&absolute).map_err(|source| ScanError::Read {
            path: file.path.clone(),
            source,
        })?;

        let record = match file.language {
            Language::Python => python::scan(self, &file.path, &content)?,
            Language::Shell => shell::scan(self, &file.path, &content),
        };

        debug!(
            service = services::SCANNER,
            operation = "scan",
            path = %file.path.display(),
            imports = record.imports.len(),
            inputs = record.inputs.len(),
            has_tests = record.has_tests,
            "scanned source"
        );

        Ok(record)
    }

    /// Map an absolute candidate back into the project, dropping anything outside
    /// it and self references.
    pub(crate) fn project_file(&self, candidate: &Path, importer: &Path) -> Option<PathBuf> {
        let relative = paths::relative_to(&self.root, candidate)?;
        if relative.as_os_str().is_empty() || relative == importer {
            return None;
        }
        Some(relative)
    }
}

/// Tracks whether a line starts inside a triple-quoted string or an open
/// bracket, so only real top-level statements are inspected.
#[derive(Debug, Default)]
pub(crate) struct LineState {
    triple: Option<&'static str>,
    depth: i32,
    continued: bool,
}

impl LineState {
    /// True when the next line begins a fresh statement
    pub fn at_statement_start(&self) -> bool {
        self.triple.is_none() && self.depth <= 0 && !self.continued
    }

    pub fn inside_string(&self) -> bool {
        self.triple.is_some()
    }

    /// Advance the state past one line of source
    pub fn feed(&mut self, line: &str) {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if let Some(delim) = self.triple {
                if bytes[i..].starts_with(delim.as_bytes()) {
                    self.triple = None;
                    i += 3;
                } else {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                continue;
            }
            match bytes[i] {
                b'#' => break,
                b'"' | b'\'' => {
                    let quote = bytes[i];
                    if bytes[i..].starts_with(b"\"\"\"") {
                        self.triple = Some("\"\"\"");
                        i += 3;
                    } else if bytes[i..].starts_with(b"'''") {
                        self.triple = Some("'''");
                        i += 3;
                    } else {
                        i += 1;
                        while i < bytes.len() && bytes[i] != quote {
                            i += if bytes[i] == b'\\' { 2 } else { 1 };
                        }
                        i += 1;
                    }
                }
                b'(' | b'[' | b'{' => {
                    self.depth += 1;
                    i += 1;
                }
                b')' | b']' | b'}' => {
                    self.depth -= 1;
                    i += 1;
                }
                _ => i += 1,
            }
        }
        self.continued = self.triple.is_none() && line.trim_end().ends_with('\\');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use tempfile::TempDir;

    #[test]
    fn test_line_state_tracks_docstrings() {
        let mut state = LineState::default();
        state.feed("\"\"\"Module docstring");
        assert!(state.inside_string());
        state.feed("import not_an_import");
        assert!(state.inside_string());
        state.feed("\"\"\"");
        assert!(state.at_statement_start());
    }

    #[test]
    fn test_line_state_tracks_brackets() {
        let mut state = LineState::default();
        state.feed("INPUTS = [");
        assert!(!state.at_statement_start());
        state.feed("    'a.txt',  # ] not a bracket");
        assert!(!state.at_statement_start());
        state.feed("]");
        assert!(state.at_statement_start());
    }

    #[test]
    fn test_scan_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let scanner = Scanner::new(temp.path(), vec![]);
        let file = SourceFile::new("missing.py", Language::Python, SystemTime::now());

        let err = scanner.scan(&file).unwrap_err();
        assert!(matches!(err, ScanError::Read { .. }));
        assert!(err.to_string().contains("missing.py"));
    }

    #[test]
    fn test_project_file_drops_outside_and_self() {
        let temp = TempDir::new().unwrap();
        let scanner = Scanner::new(temp.path(), vec![]);
        let importer = Path::new("a.py");

        assert_eq!(
            scanner.project_file(&temp.path().join("b.py"), importer),
            Some(PathBuf::from("b.py"))
        );
        assert_eq!(scanner.project_file(&temp.path().join("a.py"), importer), None);
        assert_eq!(scanner.project_file(Path::new("/usr/lib/os.py"), importer), None);
    }
}
