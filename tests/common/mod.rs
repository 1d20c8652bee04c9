// Common test utilities shared across acceptance tests
//
// Every test works in its own temporary project with a `booster.toml` at its
// root, so config discovery never walks past it. Source files are written with
// mtimes in the past and markers are aged explicitly, which keeps timestamp
// comparisons independent of filesystem mtime resolution.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Two hours ago: the default age of files created by the workspace
pub const SOURCE_AGE: u64 = 7200;

pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Workspace with a default `booster.toml`
    pub fn new() -> Self {
        Self::with_config("")
    }

    pub fn with_config(config: &str) -> Self {
        let workspace = Self {
            temp_dir: TempDir::new().unwrap(),
        };
        workspace.write_config(config);
        workspace
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write_config(&self, config: &str) {
        fs::write(self.path().join("booster.toml"), config).unwrap();
    }

    /// Create a file with its mtime `SOURCE_AGE` seconds in the past
    pub fn create_file(&self, path: &str, content: &str) -> PathBuf {
        self.create_file_aged(path, content, SOURCE_AGE)
    }

    pub fn create_file_aged(&self, path: &str, content: &str, age_secs: u64) -> PathBuf {
        let file_path = self.path().join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&file_path, content).unwrap();
        set_age(&file_path, age_secs);
        file_path
    }

    /// Set the mtime of everything below `dir` to `age_secs` ago
    pub fn age_tree(&self, dir: &str, age_secs: u64) {
        for entry in WalkDir::new(self.path().join(dir)) {
            let entry = entry.unwrap();
            if entry.file_type().is_file() {
                set_age(entry.path(), age_secs);
            }
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.path().join(path).exists()
    }

    pub fn read_file(&self, path: &str) -> String {
        fs::read_to_string(self.path().join(path)).unwrap()
    }

    pub fn modified(&self, path: &str) -> SystemTime {
        fs::metadata(self.path().join(path))
            .unwrap()
            .modified()
            .unwrap()
    }

    /// The booster binary, run from the workspace root with a clean environment
    pub fn booster(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_booster"));
        cmd.current_dir(self.path())
            .env_remove("BOOSTER_CONFIG")
            .env_remove("BOOSTER_SOURCE_ROOT")
            .env_remove("BOOSTER_CACHE_ROOT")
            .env_remove("BOOSTER_STRICT")
            .env_remove("BOOSTER_JOBS")
            .env_remove("BOOSTER_KEEP_CORRUPT_OUTPUT")
            .env("BOOSTER_LOG_FORMAT", "compact");
        cmd
    }

    /// The `bbb` imports `ccc`, `ccc` declares an input file and has a test
    pub fn create_bbb_ccc(&self) {
        self.create_file(
            "bbb.py",
            "#!/usr/bin/env python3\n\"This is bbb\"\n\nimport sys\nimport ccc\n\n\ndef main():\n    ccc.monkey()\n",
        );
        self.create_file(
            "ccc.py",
            "MONKEY_FILE = 'test-src/f.txt'\nINPUTS = [MONKEY_FILE]\n\n\ndef monkey():\n    return open(MONKEY_FILE).read()\n\n\ndef test_trivial():\n    assert True\n",
        );
        self.create_file("test-src/f.txt", "monkey\n");
    }
}

pub fn set_age(path: &Path, age_secs: u64) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
        .unwrap();
}
