use anyhow::Result;
use std::path::Path;

use crate::cli::{CommonConfigArgs, MarkArgs};
use crate::script::ArtifactKind;

pub fn run(common: &CommonConfigArgs, args: MarkArgs) -> Result<()> {
    let kind: ArtifactKind = args.kind.parse()?;
    if kind == ArtifactKind::Deps {
        anyhow::bail!("'d' is a dependency fragment, not a marker; use `booster deps`");
    }

    let project = super::load_project(common)?;
    let file = project.relative(Path::new(&args.file))?;
    project.store().mark_fresh(&file, kind)?;
    Ok(())
}
