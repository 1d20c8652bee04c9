/// Source languages understood by the scanner
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::AnalysisDepth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Shell,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Python, Language::Shell];

    pub fn name(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Shell => "shell",
        }
    }

    pub fn default_extensions(self) -> Vec<String> {
        match self {
            Language::Python => vec!["py".to_string()],
            Language::Shell => vec!["sh".to_string(), "bash".to_string()],
        }
    }

    pub fn default_analyzer(self) -> &'static str {
        match self {
            Language::Python => "pylint",
            Language::Shell => "shellcheck",
        }
    }

    /// pylint follows imports, shellcheck looks at one file at a time
    pub fn default_depth(self) -> AnalysisDepth {
        match self {
            Language::Python => AnalysisDepth::Transitive,
            Language::Shell => AnalysisDepth::Single,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tracked script, with its path relative to the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub language: Language,
    pub modified: SystemTime,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, language: Language, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            language,
            modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
