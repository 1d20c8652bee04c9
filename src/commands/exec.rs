use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cli::{CommonConfigArgs, ExecArgs};
use crate::cli_utils::booster_prefix;
use crate::script::executor::run_command;

/// Run a pipeline command. Unless corrupt outputs are kept, every declared
/// output is deleted when the command fails or is interrupted, so a partial
/// file never looks up to date.
pub async fn run(common: &CommonConfigArgs, args: ExecArgs) -> Result<()> {
    let config = super::load_config_or_default(common);
    let keep = args.keep || config.checks.keep_corrupt_output;
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let outputs: Vec<PathBuf> = args.outputs.iter().map(|o| cwd.join(o)).collect();

    let status = tokio::select! {
        status = run_command(&args.command, &cwd) => Some(status?),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping command");
            None
        }
    };

    let code = match status {
        Some(status) if status.success() => return Ok(()),
        Some(status) => status.code().unwrap_or(1),
        // Conventional exit status for SIGINT
        None => 130,
    };

    if keep {
        warn!("Command failed, keeping outputs");
    } else {
        for output in &outputs {
            if remove_output(output)? {
                eprintln!("{} Deleted {}", booster_prefix(), output.display());
            }
        }
    }

    std::process::exit(code);
}

fn remove_output(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
    }
}
