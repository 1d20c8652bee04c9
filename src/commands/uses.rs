use anyhow::Result;

use crate::cli::{CommonConfigArgs, UsesArgs};
use crate::script::paths;
use crate::script::uses::uses_paths;

pub fn run(common: &CommonConfigArgs, args: UsesArgs) -> Result<()> {
    let project = super::load_project(common)?;

    let mut deps = Vec::new();
    for script in &args.scripts {
        for dep in uses_paths(project.store(), script, project.strict()) {
            let dep = paths::display(&dep);
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
    }

    println!("{}", deps.join(" "));
    Ok(())
}
