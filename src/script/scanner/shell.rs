/// Shell `source` extraction
///
/// `source lib.sh` and `. lib.sh` with a literal path are import edges. Paths
/// built from variables or command substitution cannot be resolved statically
/// and are skipped.
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use super::{ScanRecord, Scanner};

static SOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:source|\.)\s+([^\s;&|#]+)").expect("valid regex"));

pub fn scan(scanner: &Scanner, path: &Path, content: &str) -> ScanRecord {
    let mut record = ScanRecord::default();
    let importer_dir = scanner
        .root()
        .join(path.parent().unwrap_or_else(|| Path::new("")));

    for line in content.lines() {
        let Some(caps) = SOURCE.captures(line) else {
            continue;
        };
        let target = caps[1].trim_matches(|c| c == '"' || c == '\'');
        if target.contains('$') || target.contains('`') {
            continue;
        }

        // bash looks in the working directory, which is the project root under make
        let candidates = [scanner.root().join(target), importer_dir.join(target)];
        let Some(found) = candidates
            .iter()
            .filter(|candidate| candidate.is_file())
            .find_map(|candidate| scanner.project_file(candidate, path))
        else {
            continue;
        };

        if !record.imports.contains(&found) {
            record.imports.push(found);
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_source_forms() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("bin/lib")).unwrap();
        fs::write(temp.path().join("common.sh"), "").unwrap();
        fs::write(temp.path().join("bin/lib/env.sh"), "").unwrap();

        let scanner = Scanner::new(temp.path(), vec![]);
        let content = "#!/bin/bash\nsource common.sh\n. \"lib/env.sh\"\nsource \"$HOME/.profile\"\nsource missing.sh\n";
        let record = scan(&scanner, Path::new("bin/run.sh"), content);

        assert_eq!(
            record.imports,
            vec![PathBuf::from("common.sh"), PathBuf::from("bin/lib/env.sh")]
        );
        assert!(record.inputs.is_empty());
        assert!(!record.has_tests);
    }
}
