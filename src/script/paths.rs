/// Lexical path helpers shared by the scanner, the store and the graph
use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Keep leading `..` on relative paths, they point outside the tree
                let at_parent = matches!(out.components().next_back(), Some(Component::ParentDir));
                if (at_parent || !out.pop()) && !path.is_absolute() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Express `path` relative to `root`, or None if it lies outside of it
pub fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&root.join(path))
    };
    absolute
        .strip_prefix(normalize(root))
        .ok()
        .map(Path::to_path_buf)
}

/// Render a path the way make rules expect it (forward slashes)
pub fn display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
