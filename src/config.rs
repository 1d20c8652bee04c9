use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::script::language::Language;

/// Complete Booster configuration (loaded from `booster.toml`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BoosterConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub languages: LanguagesConfig,

    #[serde(default)]
    pub checks: ChecksConfig,

    /// Commands producing several outputs at once
    #[serde(default, rename = "group")]
    pub groups: Vec<GroupConfig>,
}

/// Where sources live and where derived artifacts go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Tree scanned for source files (relative to the project root)
    #[serde(default = "default_source_root")]
    pub source_root: String,

    /// Mirror tree holding `.sc`, `.ec`, `.inputs`, `.scan`, `.test` and `.d` artifacts
    #[serde(default = "default_cache_root")]
    pub cache_root: String,

    /// Glob patterns (project-relative) excluded from the tree scan
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Extra directories searched for absolute Python imports
    #[serde(default)]
    pub python_path: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            cache_root: default_cache_root(),
            exclude: default_exclude(),
            python_path: Vec::new(),
        }
    }
}

/// How deep a static analyzer looks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    /// The analyzer only reads the file it is given
    Single,
    /// The analyzer follows imports, so its verdict depends on the source context
    Transitive,
}

/// Per-language settings. Unset fields fall back to the language's defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub extensions: Option<Vec<String>>,

    /// Static analyzer command; a disabled value makes scans always succeed
    #[serde(default)]
    pub analyzer: Option<String>,

    #[serde(default)]
    pub depth: Option<AnalysisDepth>,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extensions: None,
            analyzer: None,
            depth: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LanguagesConfig {
    #[serde(default)]
    pub python: LanguageConfig,

    #[serde(default)]
    pub shell: LanguageConfig,
}

/// Language settings with defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSettings {
    pub language: Language,
    pub enabled: bool,
    pub extensions: Vec<String>,
    pub analyzer: String,
    pub depth: AnalysisDepth,
}

impl LanguagesConfig {
    pub fn get(&self, language: Language) -> &LanguageConfig {
        match language {
            Language::Python => &self.python,
            Language::Shell => &self.shell,
        }
    }

    pub fn settings(&self, language: Language) -> LanguageSettings {
        let config = self.get(language);
        LanguageSettings {
            language,
            enabled: config.enabled,
            extensions: config
                .extensions
                .clone()
                .unwrap_or_else(|| language.default_extensions()),
            analyzer: config
                .analyzer
                .clone()
                .unwrap_or_else(|| language.default_analyzer().to_string()),
            depth: config.depth.unwrap_or_else(|| language.default_depth()),
        }
    }

    /// Language of `path` by extension, considering enabled languages only
    pub fn language_of(&self, path: &Path) -> Option<Language> {
        let extension = path.extension()?.to_str()?;
        Language::ALL.into_iter().find(|language| {
            let settings = self.settings(*language);
            settings.enabled && settings.extensions.iter().any(|e| e == extension)
        })
    }
}

/// Gatekeeper and execution policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksConfig {
    /// Test runner command; a disabled value makes tests always succeed
    #[serde(default = "default_tester")]
    pub tester: String,

    /// Steps using a script also wait for a fresh scan of it
    #[serde(default)]
    pub strict_scan: bool,

    /// Keep partially written outputs of failed steps (default: delete them)
    #[serde(default)]
    pub keep_corrupt_output: bool,

    /// Concurrent checks (0 = number of CPUs)
    #[serde(default)]
    pub jobs: usize,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            tester: default_tester(),
            strict_scan: false,
            keep_corrupt_output: false,
            jobs: 0,
        }
    }
}

impl ChecksConfig {
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}

/// One command producing several outputs, tracked through a sentinel file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupConfig {
    pub sentinel: String,

    pub outputs: Vec<String>,

    /// Data files the command reads
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Scripts the command runs (expanded through `uses`)
    #[serde(default)]
    pub uses: Vec<String>,

    #[serde(default)]
    pub command: Option<String>,
}

fn default_source_root() -> String {
    ".".to_string()
}

fn default_cache_root() -> String {
    "deps".to_string()
}

fn default_exclude() -> Vec<String> {
    vec![".git/**".to_string(), ".venv/**".to_string()]
}

fn default_tester() -> String {
    "pytest".to_string()
}

fn default_true() -> bool {
    true
}

impl BoosterConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: BoosterConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Generate example configuration as TOML string
    pub fn example() -> Result<String> {
        let config = BoosterConfig {
            languages: LanguagesConfig {
                python: LanguageConfig {
                    analyzer: Some("pylint".to_string()),
                    depth: Some(AnalysisDepth::Transitive),
                    ..Default::default()
                },
                shell: LanguageConfig {
                    analyzer: Some("shellcheck".to_string()),
                    depth: Some(AnalysisDepth::Single),
                    ..Default::default()
                },
            },
            groups: vec![GroupConfig {
                sentinel: "out/.split.stamp".to_string(),
                outputs: vec!["out/train.csv".to_string(), "out/test.csv".to_string()],
                inputs: vec!["data/raw.csv".to_string()],
                uses: vec!["scripts/split.py".to_string()],
                command: Some("python3 scripts/split.py".to_string()),
            }],
            ..Default::default()
        };

        Ok(toml::to_string_pretty(&config)?)
    }

    /// Command-line values win over file values
    pub fn apply_overrides(
        &mut self,
        source_root: Option<&str>,
        cache_root: Option<&str>,
        strict: bool,
    ) {
        if let Some(source_root) = source_root {
            self.paths.source_root = source_root.to_string();
        }
        if let Some(cache_root) = cache_root {
            self.paths.cache_root = cache_root.to_string();
        }
        if strict {
            self.checks.strict_scan = true;
        }
    }

    pub fn source_root(&self) -> PathBuf {
        PathBuf::from(&self.paths.source_root)
    }

    pub fn cache_root(&self) -> PathBuf {
        PathBuf::from(&self.paths.cache_root)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.paths.source_root.trim().is_empty() {
            anyhow::bail!("paths.source_root must be set");
        }
        if self.paths.cache_root.trim().is_empty() {
            anyhow::bail!("paths.cache_root must be set");
        }
        if crate::script::paths::normalize(&self.source_root())
            == crate::script::paths::normalize(&self.cache_root())
        {
            anyhow::bail!("paths.cache_root must differ from paths.source_root");
        }

        for pattern in &self.paths.exclude {
            glob::Pattern::new(pattern)
                .with_context(|| format!("paths.exclude has an invalid pattern: {}", pattern))?;
        }

        let mut claimed: HashMap<String, Language> = HashMap::new();
        for language in Language::ALL {
            let settings = self.languages.settings(language);
            if !settings.enabled {
                continue;
            }
            if settings.extensions.is_empty() {
                anyhow::bail!("languages.{}.extensions must not be empty", language);
            }
            for extension in settings.extensions {
                if let Some(other) = claimed.insert(extension.clone(), language) {
                    anyhow::bail!(
                        "extension '{}' is claimed by both languages.{} and languages.{}",
                        extension,
                        other,
                        language
                    );
                }
            }
        }

        for (i, group) in self.groups.iter().enumerate() {
            if group.sentinel.trim().is_empty() {
                anyhow::bail!("group #{} must set a sentinel", i + 1);
            }
            if group.outputs.is_empty() {
                anyhow::bail!("group #{} ({}) must list its outputs", i + 1, group.sentinel);
            }
            if group.outputs.contains(&group.sentinel) {
                anyhow::bail!(
                    "group #{} lists its sentinel {} among its outputs",
                    i + 1,
                    group.sentinel
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BoosterConfig::default();
        assert_eq!(config.paths.source_root, ".");
        assert_eq!(config.paths.cache_root, "deps");
        assert!(!config.checks.strict_scan);
        assert!(!config.checks.keep_corrupt_output);
        assert_eq!(config.checks.tester, "pytest");
    }

    #[test]
    fn test_validate_config() {
        let config = BoosterConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_language_defaults_and_overrides() {
        let config: BoosterConfig = toml::from_str(
            r#"
[languages.python]
analyzer = "flake8"
depth = "single"
"#,
        )
        .unwrap();

        let python = config.languages.settings(Language::Python);
        assert_eq!(python.analyzer, "flake8");
        assert_eq!(python.depth, AnalysisDepth::Single);
        assert_eq!(python.extensions, vec!["py"]);

        let shell = config.languages.settings(Language::Shell);
        assert_eq!(shell.analyzer, "shellcheck");
        assert_eq!(shell.depth, AnalysisDepth::Single);
    }

    #[test]
    fn test_language_of() {
        let mut config = BoosterConfig::default();
        assert_eq!(
            config.languages.language_of(Path::new("scripts/a.py")),
            Some(Language::Python)
        );
        assert_eq!(
            config.languages.language_of(Path::new("run.sh")),
            Some(Language::Shell)
        );
        assert_eq!(config.languages.language_of(Path::new("data.csv")), None);

        config.languages.shell.enabled = false;
        assert_eq!(config.languages.language_of(Path::new("run.sh")), None);
    }

    #[test]
    fn test_duplicate_extension_rejected() {
        let mut config = BoosterConfig::default();
        config.languages.shell.extensions = Some(vec!["py".to_string()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_roots_rejected() {
        let mut config = BoosterConfig::default();
        config.paths.cache_root = "./".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_group_rejected() {
        let mut config = BoosterConfig::default();
        config.groups.push(GroupConfig {
            sentinel: "out/.stamp".to_string(),
            outputs: vec![],
            inputs: vec![],
            uses: vec![],
            command: None,
        });
        assert!(config.validate().is_err());

        config.groups[0].outputs = vec!["out/.stamp".to_string()];
        assert!(config.validate().is_err());

        config.groups[0].outputs = vec!["out/a.csv".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = BoosterConfig::default();
        config.apply_overrides(None, Some("build/deps"), true);
        assert_eq!(config.paths.source_root, ".");
        assert_eq!(config.paths.cache_root, "build/deps");
        assert!(config.checks.strict_scan);

        config.apply_overrides(None, None, false);
        assert!(config.checks.strict_scan);
    }

    #[test]
    fn test_example_round_trips() {
        let example = BoosterConfig::example().unwrap();
        let parsed: BoosterConfig = toml::from_str(&example).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.groups.len(), 1);
    }
}
