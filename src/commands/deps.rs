use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cli::{CommonConfigArgs, DepsArgs};

pub fn run(common: &CommonConfigArgs, args: DepsArgs) -> Result<()> {
    let project = super::load_project(common)?;
    let files = args
        .files
        .iter()
        .map(|file| project.relative(Path::new(file)))
        .collect::<Result<Vec<PathBuf>>>()?;

    let graph = project.build_graph_for(&files)?;
    for file in &files {
        let outcome = project.write_deps_for(&graph, file)?;
        debug!(path = %file.display(), outcome = ?outcome, "dependency fragment");
    }

    Ok(())
}
