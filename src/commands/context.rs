use anyhow::Result;
use std::path::Path;

use crate::cli::{CommonConfigArgs, ContextArgs};
use crate::script::paths;

pub fn run(common: &CommonConfigArgs, args: ContextArgs) -> Result<()> {
    let project = super::load_project(common)?;
    let file = project.relative(Path::new(&args.file))?;
    let graph = project.build_graph_for(std::slice::from_ref(&file))?;
    project.write_deps(&graph)?;

    let context = if args.executable {
        graph.executable_context(&file)
    } else {
        graph.source_context(&file)
    };
    for path in context {
        println!("{}", paths::display(&path));
    }
    Ok(())
}
