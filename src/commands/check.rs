use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::cli::{CheckArgs, CommonConfigArgs};
use crate::cli_utils::{booster_prefix, plural};
use crate::script::{paths, CheckKind, CheckOutcome, Gatekeeper};

/// `booster scan` and `booster test`
pub async fn run(common: &CommonConfigArgs, kind: CheckKind, args: CheckArgs) -> Result<()> {
    let project = super::load_project(common)?;

    let every_file = args.all || args.files.is_empty();
    let (graph, selected) = if every_file {
        (project.build_graph()?, None)
    } else {
        let files = args
            .files
            .iter()
            .map(|file| project.relative(Path::new(file)))
            .collect::<Result<Vec<PathBuf>>>()?;
        (project.build_graph_for(&files)?, Some(files))
    };
    project.write_deps(&graph)?;

    let mut gate = Gatekeeper::new(&graph, project.store(), project.config());
    if let Some(jobs) = args.jobs {
        gate = gate.with_jobs(jobs);
    }
    let sources = selected.unwrap_or_else(|| gate.all_sources(kind));
    let report = gate.check(kind, &sources, args.force).await;

    let fresh = report.count(|o| *o == CheckOutcome::Fresh);
    let passed = report.count(|o| matches!(o, CheckOutcome::Passed | CheckOutcome::Disabled));
    let failures = report.failures();

    if !failures.is_empty() {
        for (path, outcome) in &report.outcomes {
            match outcome {
                CheckOutcome::Failed { exit_code } => eprintln!(
                    "{} {} {} failed (exit code {})",
                    booster_prefix(),
                    kind,
                    paths::display(path),
                    exit_code.map_or_else(|| "none".to_string(), |code| code.to_string())
                ),
                CheckOutcome::Error(message) => eprintln!(
                    "{} {} {}: {}",
                    booster_prefix(),
                    kind,
                    paths::display(path),
                    message
                ),
                _ => {}
            }
        }
        anyhow::bail!(
            "{} of {} failed",
            plural(failures.len(), &format!("{} check", kind)),
            plural(report.outcomes.len(), "file")
        );
    }

    if !sources.is_empty() {
        eprintln!(
            "{} {}: {} passed, {} already fresh",
            booster_prefix(),
            kind,
            passed,
            fresh
        );
    }
    Ok(())
}
