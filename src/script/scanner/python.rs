/// Python import and `INPUTS` extraction
///
/// Imports are found line by line. Each import must sit on a single line and
/// begin it (after indentation), which is what any formatter produces anyway.
/// Conditional imports count: they are still dependencies when taken.
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::literal::{self, LiteralError};
use super::{LineState, ScanError, ScanRecord, Scanner};
use crate::script::paths;

static IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*import\s+([^;#]+)").expect("valid regex"));
static FROM_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*from\s+([^\s;#]+)\s+import\s+([^;#]+)").expect("valid regex")
});
static TEST_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:async\s+)?def\s+test_").expect("valid regex"));
static MODULE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$").expect("valid regex")
});

pub fn scan(scanner: &Scanner, path: &Path, content: &str) -> Result<ScanRecord, ScanError> {
    let mut record = ScanRecord::default();
    let mut state = LineState::default();
    let importer_dir = scanner
        .root()
        .join(path.parent().unwrap_or_else(|| Path::new("")));

    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;
        let inside_string = state.inside_string();
        state.feed(line);
        if inside_string {
            continue;
        }

        if TEST_DEF.is_match(line) {
            record.has_tests = true;
            continue;
        }

        let found = if let Some(caps) = FROM_IMPORT.captures(line) {
            from_import(scanner, path, &importer_dir, &caps[1], &caps[2], line_number)?
        } else if let Some(caps) = IMPORT.captures(line) {
            plain_import(scanner, path, &importer_dir, &caps[1], line_number)?
        } else {
            continue;
        };

        for file in found {
            if !record.imports.contains(&file) {
                record.imports.push(file);
            }
        }
    }

    if let Some(declared) = literal::evaluate_inputs(content).map_err(
        |LiteralError { line, message }| ScanError::Inputs {
            path: path.to_path_buf(),
            line,
            message,
        },
    )? {
        for input in declared {
            let input = paths::normalize(Path::new(input.trim()));
            if !record.inputs.contains(&input) {
                record.inputs.push(input);
            }
        }
    }

    Ok(record)
}

/// `import a`, `import a.b as c, d`
fn plain_import(
    scanner: &Scanner,
    path: &Path,
    importer_dir: &Path,
    list: &str,
    line: usize,
) -> Result<Vec<PathBuf>, ScanError> {
    let mut found = Vec::new();
    for item in list.split(',') {
        let module = checked_module(path, first_word(item), line)?;
        found.extend(resolve_absolute(scanner, path, importer_dir, module));
    }
    Ok(found)
}

/// `from a.b import x, y`, `from . import x`, `from ..pkg import y`
fn from_import(
    scanner: &Scanner,
    path: &Path,
    importer_dir: &Path,
    module: &str,
    names: &str,
    line: usize,
) -> Result<Vec<PathBuf>, ScanError> {
    let names: Vec<&str> = names
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(['\\', ')'])
        .split(',')
        .map(first_word)
        .filter(|name| !name.is_empty() && *name != "*")
        .collect();

    let level = module.chars().take_while(|c| *c == '.').count();
    let rest = &module[level..];

    let mut found = Vec::new();
    if level == 0 {
        let module = checked_module(path, rest, line)?;
        found.extend(resolve_absolute(scanner, path, importer_dir, module));
        for name in names {
            let submodule = format!("{}.{}", module, name);
            if MODULE_NAME.is_match(&submodule) {
                found.extend(resolve_absolute(scanner, path, importer_dir, &submodule));
            }
        }
        return Ok(found);
    }

    // Relative import: one dot is the importer's package, each extra dot goes up
    let mut base = importer_dir.to_path_buf();
    for _ in 1..level {
        if !base.pop() {
            return Err(parse_error(path, line, "relative import beyond the filesystem root"));
        }
    }

    let parts: Vec<&str> = if rest.is_empty() {
        Vec::new()
    } else {
        checked_module(path, rest, line)?.split('.').collect()
    };

    if parts.is_empty() {
        let init = base.join("__init__.py");
        if init.is_file() {
            found.push(init);
        }
    } else if let Some(files) = resolve_in(&base, &parts) {
        found.extend(files);
    }
    for name in names {
        if !MODULE_NAME.is_match(name) {
            continue;
        }
        let mut submodule = parts.clone();
        submodule.push(name);
        if let Some(files) = resolve_in(&base, &submodule) {
            found.extend(files);
        }
    }

    Ok(found
        .iter()
        .filter_map(|candidate| scanner.project_file(candidate, path))
        .collect())
}

fn first_word(item: &str) -> &str {
    item.split_whitespace().next().unwrap_or("")
}

fn checked_module<'a>(path: &Path, module: &'a str, line: usize) -> Result<&'a str, ScanError> {
    if MODULE_NAME.is_match(module) {
        Ok(module)
    } else {
        Err(parse_error(
            path,
            line,
            format!("invalid module name '{}' in import", module),
        ))
    }
}

fn parse_error(path: &Path, line: usize, message: impl Into<String>) -> ScanError {
    ScanError::Parse {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

/// Look the module up next to the importer, then in the configured search
/// directories. Modules found nowhere inside the project are external.
fn resolve_absolute(
    scanner: &Scanner,
    path: &Path,
    importer_dir: &Path,
    module: &str,
) -> Vec<PathBuf> {
    let parts: Vec<&str> = module.split('.').collect();
    let bases = std::iter::once(importer_dir).chain(scanner.search_dirs().iter().map(PathBuf::as_path));

    for base in bases {
        if let Some(files) = resolve_in(base, &parts) {
            return files
                .iter()
                .filter_map(|candidate| scanner.project_file(candidate, path))
                .collect();
        }
    }
    Vec::new()
}

/// Resolve `a.b.c` below `base`: the module file itself plus every package
/// `__init__.py` that importing it executes.
fn resolve_in(base: &Path, parts: &[&str]) -> Option<Vec<PathBuf>> {
    let (last, packages) = parts.split_last()?;
    let mut found = Vec::new();
    let mut dir = base.to_path_buf();

    for package in packages {
        dir.push(package);
        if !dir.is_dir() {
            return None;
        }
        let init = dir.join("__init__.py");
        if init.is_file() {
            found.push(init);
        }
    }

    let module_file = dir.join(format!("{}.py", last));
    let package_init = dir.join(last).join("__init__.py");
    if module_file.is_file() {
        found.push(module_file);
    } else if package_init.is_file() {
        found.push(package_init);
    } else {
        return None;
    }
    Some(found)
}
