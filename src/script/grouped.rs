/// Grouped-output targets
///
/// One command writes several outputs. All outputs hang off a sentinel file,
/// and only the sentinel owns the command, so the command runs once per
/// rebuild. If an output disappears while the sentinel survives, the sentinel
/// is deleted at graph-build time so the whole group is produced again.
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::graph::{Action, Node, Rule};
use super::paths;
use super::uses;
use crate::config::GroupConfig;
use crate::logging::services;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedTarget {
    pub sentinel: PathBuf,
    pub outputs: Vec<PathBuf>,
    pub inputs: Vec<PathBuf>,
    pub uses: Vec<PathBuf>,
    pub command: Option<String>,
}

/// What healing did to a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealOutcome {
    /// Sentinel and all outputs present, or sentinel already absent
    Consistent,
    /// Sentinel deleted because these outputs were missing
    Healed { missing: Vec<PathBuf> },
}

impl From<&GroupConfig> for GroupedTarget {
    fn from(config: &GroupConfig) -> Self {
        let clean = |items: &[String]| -> Vec<PathBuf> {
            items
                .iter()
                .map(|item| paths::normalize(Path::new(item.trim())))
                .collect()
        };
        Self {
            sentinel: paths::normalize(Path::new(config.sentinel.trim())),
            outputs: clean(&config.outputs),
            inputs: clean(&config.inputs),
            uses: clean(&config.uses),
            command: config.command.clone(),
        }
    }
}

impl GroupedTarget {
    /// Delete the sentinel if any output is missing. Running it again without
    /// outside changes does nothing.
    pub fn heal(&self, project_root: &Path) -> Result<HealOutcome> {
        let sentinel = project_root.join(&self.sentinel);
        if !sentinel.exists() {
            return Ok(HealOutcome::Consistent);
        }

        let missing: Vec<PathBuf> = self
            .outputs
            .iter()
            .filter(|output| !project_root.join(output).exists())
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(HealOutcome::Consistent);
        }

        fs::remove_file(&sentinel)
            .with_context(|| format!("Failed to remove sentinel: {}", sentinel.display()))?;

        info!(
            service = services::GROUPED,
            operation = "heal",
            status = "healed",
            sentinel = %self.sentinel.display(),
            missing = missing.len(),
            "removed sentinel of incomplete group"
        );

        Ok(HealOutcome::Healed { missing })
    }

    /// Outputs depend on the sentinel; the sentinel depends on the group's
    /// inputs and on everything the scripts it runs use.
    pub fn rules(&self, strict: bool) -> Vec<(Node, Rule)> {
        let mut rules: Vec<(Node, Rule)> = self
            .outputs
            .iter()
            .map(|output| {
                (
                    Node::file(output),
                    Rule {
                        deps: vec![Node::file(&self.sentinel)],
                        action: Action::SideEffect,
                    },
                )
            })
            .collect();

        let mut deps: Vec<Node> = self.inputs.iter().map(Node::file).collect();
        for script in &self.uses {
            deps.extend(uses::uses(&paths::display(script), strict));
        }
        rules.push((
            Node::file(&self.sentinel),
            Rule {
                deps,
                action: Action::Command(self.command.clone()),
            },
        ));
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::store::ArtifactKind;
    use tempfile::TempDir;

    fn group() -> GroupedTarget {
        GroupedTarget::from(&GroupConfig {
            sentinel: "out/.stamp".to_string(),
            outputs: vec!["out/a.csv".to_string(), " out/b.csv".to_string()],
            inputs: vec!["data/raw.csv".to_string()],
            uses: vec!["split.py".to_string()],
            command: Some("python3 split.py".to_string()),
        })
    }

    fn touch(root: &Path, path: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, "").unwrap();
    }

    #[test]
    fn test_missing_output_removes_sentinel() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "out/.stamp");
        touch(temp.path(), "out/a.csv");

        let outcome = group().heal(temp.path()).unwrap();
        assert_eq!(
            outcome,
            HealOutcome::Healed {
                missing: vec![PathBuf::from("out/b.csv")]
            }
        );
        assert!(!temp.path().join("out/.stamp").exists());

        // Idempotent once healed
        assert_eq!(group().heal(temp.path()).unwrap(), HealOutcome::Consistent);
    }

    #[test]
    fn test_complete_group_is_left_alone() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "out/.stamp");
        touch(temp.path(), "out/a.csv");
        touch(temp.path(), "out/b.csv");

        assert_eq!(group().heal(temp.path()).unwrap(), HealOutcome::Consistent);
        assert!(temp.path().join("out/.stamp").exists());
    }

    #[test]
    fn test_missing_sentinel_with_outputs_present_is_consistent() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "out/a.csv");
        touch(temp.path(), "out/b.csv");

        assert_eq!(group().heal(temp.path()).unwrap(), HealOutcome::Consistent);
        assert!(temp.path().join("out/a.csv").exists());
    }

    #[test]
    fn test_rules() {
        let rules = group().rules(true);
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].0, Node::file("out/a.csv"));
        assert_eq!(rules[0].1.deps, vec![Node::file("out/.stamp")]);

        let (sentinel, rule) = &rules[2];
        assert_eq!(*sentinel, Node::file("out/.stamp"));
        assert_eq!(
            rule.deps,
            vec![
                Node::file("data/raw.csv"),
                Node::artifact(ArtifactKind::Ec, "split.py"),
                Node::artifact(ArtifactKind::Scan, "split.py"),
            ]
        );
        assert_eq!(
            rule.action,
            Action::Command(Some("python3 split.py".to_string()))
        );
    }
}
