/// `uses()` accessor: what a pipeline step running a script must depend on
use std::path::{Path, PathBuf};

use super::graph::Node;
use super::paths;
use super::store::{ArtifactKind, ContextStore};

/// EC of the script, plus its scan marker in strict mode. Surrounding
/// whitespace is ignored; an empty argument yields no dependencies.
pub fn uses(script: &str, strict: bool) -> Vec<Node> {
    let script = script.trim();
    if script.is_empty() {
        return Vec::new();
    }

    let path = paths::normalize(Path::new(script));
    let mut deps = vec![Node::artifact(ArtifactKind::Ec, &path)];
    if strict {
        deps.push(Node::artifact(ArtifactKind::Scan, &path));
    }
    deps
}

/// `uses` rendered as project-relative paths
pub fn uses_paths(store: &ContextStore, script: &str, strict: bool) -> Vec<PathBuf> {
    uses(script, strict)
        .iter()
        .map(|node| node.path(store))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uses_is_the_executable_context() {
        let store = ContextStore::new("/project", "deps");
        assert_eq!(
            uses_paths(&store, "  scripts/bbb.py\n", false),
            vec![PathBuf::from("deps/scripts/bbb.py.ec")]
        );
    }

    #[test]
    fn test_strict_uses_adds_scan_marker() {
        let store = ContextStore::new("/project", "deps");
        assert_eq!(
            uses_paths(&store, "./bbb.py", true),
            vec![
                PathBuf::from("deps/bbb.py.ec"),
                PathBuf::from("deps/bbb.py.scan")
            ]
        );
    }

    #[test]
    fn test_blank_uses_is_empty() {
        assert!(uses("   ", true).is_empty());
    }
}
