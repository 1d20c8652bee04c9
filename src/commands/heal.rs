use anyhow::Result;

use crate::cli::CommonConfigArgs;
use crate::cli_utils::booster_prefix;
use crate::script::{paths, HealOutcome};

pub fn run(common: &CommonConfigArgs) -> Result<()> {
    let project = super::load_project(common)?;

    for (sentinel, outcome) in project.heal_groups()? {
        if let HealOutcome::Healed { missing } = outcome {
            let missing: Vec<String> = missing.iter().map(|path| paths::display(path)).collect();
            eprintln!(
                "{} Removed {} (missing: {})",
                booster_prefix(),
                paths::display(&sentinel),
                missing.join(", ")
            );
        }
    }
    Ok(())
}
