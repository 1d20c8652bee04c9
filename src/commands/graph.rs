use anyhow::Result;

use crate::cli::{CommonConfigArgs, GraphArgs};
use crate::cli_utils::{booster_prefix, plural};
use crate::script::makefile;

pub fn run(common: &CommonConfigArgs, args: GraphArgs) -> Result<()> {
    let project = super::load_project(common)?;
    let graph = project.build_graph()?;
    let summary = project.write_deps(&graph)?;

    if args.print {
        for source in graph.sources() {
            if let Some(fragment) = makefile::render_deps(&graph, project.store(), source) {
                print!("{}", fragment);
            }
        }
    }

    let sources = graph.sources().count();
    eprintln!(
        "{} {}, {} updated",
        booster_prefix(),
        plural(sources, "source file"),
        plural(summary.written + summary.touched, "fragment")
    );
    Ok(())
}
