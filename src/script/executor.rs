/// External tool execution
///
/// Analyzers and test runners are invoked with the file as their last argument
/// from the project root. Their output is passed through untouched; only the
/// exit status matters to the caller.
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::logging::services;

/// Tool settings that mean "always succeed without running anything"
pub const DISABLED_VALUES: [&str; 6] = ["", "true", ":", "none", "off", "disabled"];

pub fn is_disabled(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    DISABLED_VALUES.contains(&value.as_str())
}

/// A configured tool command line, split on whitespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    /// None for disabled values
    pub fn parse(value: &str) -> Option<Self> {
        if is_disabled(value) {
            return None;
        }
        let mut words = value.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }

    /// Resolve the program from PATH, falling back to the name as given
    fn resolve(&self) -> PathBuf {
        which::which(&self.program).unwrap_or_else(|e| {
            debug!(
                service = services::GATE,
                operation = "resolve",
                program = %self.program,
                "not found in PATH ({}), trying as-is",
                e
            );
            PathBuf::from(&self.program)
        })
    }
}

/// Result of one tool run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub exit_code: Option<i32>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs tools from the project root
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    project_root: PathBuf,
}

impl ToolExecutor {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// Run `tool` against one project-relative file
    pub async fn run_on(&self, tool: &ToolCommand, file: &Path) -> Result<ExecutionResult> {
        let program = tool.resolve();

        let mut cmd = Command::new(&program);
        cmd.args(&tool.args)
            .arg(file)
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        debug!(
            service = services::GATE,
            operation = "spawn",
            command = ?cmd.as_std(),
            "running tool"
        );

        let status = cmd
            .status()
            .await
            .with_context(|| format!("Failed to spawn tool: {}", tool.program))?;

        Ok(ExecutionResult {
            exit_code: exit_code(status),
        })
    }
}

/// Run an arbitrary command line with inherited stdio
pub async fn run_command(argv: &[String], cwd: &Path) -> Result<ExitStatus> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("No command given"))?;

    let resolved = which::which(program).unwrap_or_else(|_| PathBuf::from(program));
    Command::new(&resolved)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .status()
        .await
        .with_context(|| format!("Failed to execute command: {}", program))
}

fn exit_code(status: ExitStatus) -> Option<i32> {
    if status.code().is_none() {
        warn!(
            service = services::GATE,
            operation = "wait",
            status = "signaled",
            "tool terminated by a signal"
        );
    }
    status.code()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_values() {
        for value in ["", "  ", "true", "TRUE", ":", "none", "off", "Disabled"] {
            assert!(is_disabled(value), "{value:?} should be disabled");
            assert!(ToolCommand::parse(value).is_none());
        }
        assert!(!is_disabled("pylint"));
    }

    #[test]
    fn test_parse_tool() {
        let tool = ToolCommand::parse("pylint --disable=C0114  -E").unwrap();
        assert_eq!(tool.program, "pylint");
        assert_eq!(tool.args, vec!["--disable=C0114", "-E"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_on_reports_exit_code() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("ok.sh"), "exit 0\n").unwrap();
        std::fs::write(temp.path().join("bad.sh"), "exit 3\n").unwrap();

        let executor = ToolExecutor::new(temp.path());
        let sh = ToolCommand::parse("sh").unwrap();

        let ok = executor.run_on(&sh, Path::new("ok.sh")).await.unwrap();
        assert!(ok.success());

        let bad = executor.run_on(&sh, Path::new("bad.sh")).await.unwrap();
        assert_eq!(bad.exit_code, Some(3));
        assert!(!bad.success());
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let executor = ToolExecutor::new(temp.path());
        let tool = ToolCommand::parse("booster-no-such-tool-xyz").unwrap();

        assert!(executor.run_on(&tool, Path::new("a.py")).await.is_err());
    }
}
