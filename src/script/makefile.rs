/// Make adapter
///
/// Renders the graph in make syntax: one `.d` fragment per source file with
/// its edges, and a prelude holding the pattern recipes, the `uses` function,
/// the aggregate `scan`/`test` targets and the grouped-target rules.
use std::fmt::Write as _;
use std::path::Path;

use super::graph::{Action, DepGraph, Node};
use super::paths;
use super::scanner::ScanRecord;
use super::store::{ArtifactKind, ContextStore, RECORD_HEADER};

/// Options that change the prelude
#[derive(Debug, Clone, Default)]
pub struct PreludeOptions {
    /// Command used in recipes to call back into booster
    pub booster: Option<String>,
    pub keep_corrupt_output: bool,
}

/// Escape a path for use as a make target or prerequisite
pub fn make_path(path: &Path) -> String {
    let mut out = String::new();
    for c in paths::display(path).chars() {
        match c {
            '$' => out.push_str("$$"),
            ' ' | '#' | ':' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn rule_line(out: &mut String, target: &str, deps: &[String]) {
    out.push_str(target);
    out.push(':');
    for dep in deps {
        out.push(' ');
        out.push_str(dep);
    }
    out.push('\n');
}

fn dep_paths(store: &ContextStore, deps: &[Node]) -> Vec<String> {
    deps.iter().map(|dep| make_path(&dep.path(store))).collect()
}

/// The `.d` fragment of one source file. Its first line caches the scan record.
pub fn render_deps(graph: &DepGraph, store: &ContextStore, source: &Path) -> Option<String> {
    let record = graph.record(source)?;
    let mut out = String::new();
    out.push_str(&record_header(record));

    for (node, rule) in graph.rules_for(source) {
        rule_line(
            &mut out,
            &make_path(&node.path(store)),
            &dep_paths(store, &rule.deps),
        );
    }

    let scan = make_path(&store.artifact(source, ArtifactKind::Scan));
    rule_line(&mut out, "scan", &[scan]);
    if record.has_tests {
        let test = make_path(&store.artifact(source, ArtifactKind::Test));
        rule_line(&mut out, "test", &[test]);
    }

    Some(out)
}

fn record_header(record: &ScanRecord) -> String {
    // ScanRecord only holds paths, strings and a bool
    let json = serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string());
    format!("{}{}\n", RECORD_HEADER, json)
}

/// Quote a command for `$(SHELL) -c '...'` inside a recipe
fn shell_quote(command: &str) -> String {
    let single_line = command.replace(['\n', '\r'], " ");
    format!("'{}'", single_line.replace('\'', "'\\''").replace('$', "$$"))
}

/// Delete the sentinel while make parses the prelude if any output is missing,
/// so every run sees the whole group as stale.
fn heal_block(out: &mut String, target: &str, outputs: &[String], sentinel: &Path) {
    let outputs = outputs.join(" ");
    let _ = writeln!(out, "ifneq ($(wildcard {}),)", target);
    let _ = writeln!(out, "ifneq ($(filter-out $(wildcard {0}),{0}),)", outputs);
    let _ = writeln!(out, "$(shell rm -f {})", shell_quote(&paths::display(sentinel)));
    out.push_str("endif\nendif\n");
}

/// The makefile prelude to include from the pipeline's Makefile
pub fn render_prelude(graph: &DepGraph, store: &ContextStore, options: &PreludeOptions) -> String {
    let cache = make_path(store.cache_root());
    let booster = options.booster.as_deref().unwrap_or("booster");
    let mut out = String::new();

    out.push_str("# Generated by booster. Regenerate with `booster makefile`.\n");
    let _ = writeln!(out, "BOOSTER ?= {}", booster);
    let _ = writeln!(out, "BOOSTER_CACHE := {}", cache);
    let _ = writeln!(
        out,
        "BOOSTER_STRICT := {}",
        if graph.strict() { "1" } else { "" }
    );
    if !options.keep_corrupt_output {
        out.push_str(".DELETE_ON_ERROR:\n");
    }
    out.push_str(".PHONY: scan test\n\n");

    out.push_str("# $(call uses,script.py): what a step running script.py depends on\n");
    out.push_str(
        "uses = $(foreach s,$(strip $(1)),$(BOOSTER_CACHE)/$(s).ec$(if $(BOOSTER_STRICT), $(BOOSTER_CACHE)/$(s).scan))\n\n",
    );

    for kind in [ArtifactKind::Sc, ArtifactKind::Ec, ArtifactKind::Inputs] {
        let _ = writeln!(out, "$(BOOSTER_CACHE)/%.{}:", kind.extension());
        let _ = writeln!(out, "\t@$(BOOSTER) mark {} $*", kind.extension());
    }
    for kind in [ArtifactKind::Scan, ArtifactKind::Test] {
        let _ = writeln!(out, "$(BOOSTER_CACHE)/%.{}:", kind.extension());
        let _ = writeln!(out, "\t$(BOOSTER) {} --force $*", kind.extension());
    }
    out.push_str("$(BOOSTER_CACHE)/%.d: %\n\t@$(BOOSTER) deps $*\n\n");

    out.push_str("scan:\ntest:\n\n");

    // A fragment that fails to regenerate is fatal; deleted sources are skipped
    let sources: Vec<String> = graph.sources().map(make_path).collect();
    let _ = writeln!(out, "BOOSTER_SOURCES := {}", sources.join(" "));
    out.push_str("include $(patsubst %,$(BOOSTER_CACHE)/%.d,$(wildcard $(BOOSTER_SOURCES)))\n");

    for group in graph.groups() {
        let sentinel = Node::file(&group.sentinel);
        let Some(rule) = graph.rule(&sentinel) else {
            continue;
        };
        let outputs: Vec<String> = group.outputs.iter().map(|o| make_path(o)).collect();
        let sentinel_path = make_path(&group.sentinel);

        let _ = writeln!(out, "\n# group {}", sentinel_path);
        heal_block(&mut out, &sentinel_path, &outputs, &group.sentinel);
        let _ = writeln!(out, "{}: {} ;", outputs.join(" "), sentinel_path);
        rule_line(&mut out, &sentinel_path, &dep_paths(store, &rule.deps));
        if let Action::Command(Some(command)) = &rule.action {
            let flags: Vec<String> = outputs.iter().map(|o| format!("-o {}", o)).collect();
            let _ = writeln!(
                out,
                "\t$(BOOSTER) exec {} -- $(SHELL) -c {}",
                flags.join(" "),
                shell_quote(command)
            );
            out.push_str("\t@mkdir -p $(@D) && touch $@\n");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GroupConfig, LanguagesConfig};
    use crate::script::graph::GraphBuilder;
    use crate::script::grouped::GroupedTarget;
    use crate::script::scanner::Scanner;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(root: &Path, path: &str, content: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    fn graph(root: &Path, strict: bool) -> (DepGraph, ContextStore) {
        let scanner = Scanner::new(root, vec![PathBuf::from(".")]);
        let store = ContextStore::new(root, "deps");
        let languages = LanguagesConfig::default();
        let mut builder = GraphBuilder::new(&scanner, &store, &languages, strict);
        builder.add_source(Path::new("bbb.py")).unwrap();
        builder
            .add_group(GroupedTarget::from(&GroupConfig {
                sentinel: "out/.stamp".to_string(),
                outputs: vec!["out/a.csv".to_string(), "out/b.csv".to_string()],
                inputs: vec!["data/raw.csv".to_string()],
                uses: vec!["bbb.py".to_string()],
                command: Some("python3 bbb.py --name 'x' $HOME".to_string()),
            }))
            .unwrap();
        (builder.finish(), store)
    }

    #[test]
    fn test_render_deps_for_bbb_and_ccc() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "bbb.py", "import ccc\n");
        write(
            temp.path(),
            "ccc.py",
            "MONKEY_FILE = 'test-src/f.txt'\nINPUTS = [MONKEY_FILE]\n\ndef test_trivial():\n    return True\n",
        );
        let (graph, store) = graph(temp.path(), false);

        let bbb = render_deps(&graph, &store, Path::new("bbb.py")).unwrap();
        let lines: Vec<&str> = bbb.lines().skip(1).collect();
        assert_eq!(
            lines,
            vec![
                "deps/bbb.py.sc: bbb.py deps/ccc.py.sc",
                "deps/bbb.py.ec: bbb.py deps/ccc.py.ec",
                "deps/bbb.py.scan: deps/bbb.py.sc",
                "scan: deps/bbb.py.scan",
            ]
        );
        assert!(bbb.starts_with(RECORD_HEADER));

        let ccc = render_deps(&graph, &store, Path::new("ccc.py")).unwrap();
        let lines: Vec<&str> = ccc.lines().skip(1).collect();
        assert_eq!(
            lines,
            vec![
                "deps/ccc.py.sc: ccc.py",
                "deps/ccc.py.ec: ccc.py deps/ccc.py.inputs",
                "deps/ccc.py.inputs: test-src/f.txt",
                "deps/ccc.py.scan: deps/ccc.py.sc",
                "deps/ccc.py.test: deps/ccc.py.ec",
                "scan: deps/ccc.py.scan",
                "test: deps/ccc.py.test",
            ]
        );
        assert!(!ccc.contains(".d"));
    }

    #[test]
    fn test_prelude() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "bbb.py", "");
        let (graph, store) = graph(temp.path(), true);

        let prelude = render_prelude(&graph, &store, &PreludeOptions::default());
        assert!(prelude.contains("BOOSTER_STRICT := 1\n"));
        assert!(prelude.contains(".DELETE_ON_ERROR:\n"));
        assert!(prelude.contains("BOOSTER_SOURCES := bbb.py\n"));
        assert!(prelude.contains("out/a.csv out/b.csv: out/.stamp ;\n"));
        assert!(prelude.contains(
            "ifneq ($(wildcard out/.stamp),)\n\
             ifneq ($(filter-out $(wildcard out/a.csv out/b.csv),out/a.csv out/b.csv),)\n\
             $(shell rm -f 'out/.stamp')\n\
             endif\nendif\n\
             out/a.csv out/b.csv: out/.stamp ;\n"
        ));
        assert!(prelude.contains(
            "\ninclude $(patsubst %,$(BOOSTER_CACHE)/%.d,$(wildcard $(BOOSTER_SOURCES)))\n"
        ));
        assert!(!prelude.contains("-include"));
        assert!(prelude.contains("out/.stamp: data/raw.csv deps/bbb.py.ec deps/bbb.py.scan\n"));
        assert!(prelude.contains(
            "\t$(BOOSTER) exec -o out/a.csv -o out/b.csv -- $(SHELL) -c 'python3 bbb.py --name '\\''x'\\'' $$HOME'\n"
        ));

        let keep = render_prelude(
            &graph,
            &store,
            &PreludeOptions {
                booster: Some("./target/booster".to_string()),
                keep_corrupt_output: true,
            },
        );
        assert!(!keep.contains(".DELETE_ON_ERROR"));
        assert!(keep.contains("BOOSTER ?= ./target/booster\n"));
    }

    #[test]
    fn test_make_path_escaping() {
        assert_eq!(make_path(Path::new("a b/c$d.py")), "a\\ b/c$$d.py");
    }
}
