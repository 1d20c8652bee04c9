use anyhow::{Context, Result};
use std::fs;

use crate::cli::{CommonConfigArgs, MakefileArgs};
use crate::cli_utils::booster_prefix;

pub fn run(common: &CommonConfigArgs, args: MakefileArgs) -> Result<()> {
    let project = super::load_project(common)?;
    let graph = project.build_graph()?;
    project.write_deps(&graph)?;
    let prelude = project.prelude(&graph, args.booster);

    match args.output {
        Some(path) => {
            let path = project.root().join(path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&path, prelude)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Wrote {}", booster_prefix(), path.display());
        }
        None => print!("{}", prelude),
    }
    Ok(())
}
