//! Service configuration (`chainproof.yaml`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::RunError;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const DEFAULT_CONFIG_FILE: &str = "chainproof.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub parser: ParserConfig,
}

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            project: ProjectConfig::default(),
            runner: RunnerConfig::default(),
            validator: ValidatorConfig::default(),
            parser: ParserConfig::default(),
        }
    }
}

/// Fixed layout of the staged project. All paths except `root` are relative
/// to `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub contracts_dir: PathBuf,
    pub contract_file: String,
    pub tests_dir: PathBuf,
    pub test_file: String,
    pub coverage_report: PathBuf,
    /// Directories the external toolchain generates; removed recursively.
    pub generated_dirs: Vec<PathBuf>,
    /// Single files the external toolchain generates at the root.
    pub generated_files: Vec<PathBuf>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            contracts_dir: PathBuf::from("contracts"),
            contract_file: "MyContract.sol".into(),
            tests_dir: PathBuf::from("test"),
            test_file: "MyTest.js".into(),
            coverage_report: PathBuf::from("coverage/coverage-final.json"),
            generated_dirs: vec![
                PathBuf::from("coverage"),
                PathBuf::from("artifacts"),
                PathBuf::from("cache"),
            ],
            generated_files: vec![PathBuf::from("coverage.json")],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    pub program: String,
    pub args: Vec<String>,
    /// 0 disables the bound.
    pub timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: "npx".into(),
            args: vec!["hardhat".into(), "coverage".into()],
            timeout_secs: 600,
        }
    }
}

impl RunnerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    pub interpreter: String,
    /// Relative paths resolve against the project root.
    pub script: PathBuf,
    /// Always bounded; unlike the runner, 0 is rejected at load time.
    pub timeout_secs: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            interpreter: "node".into(),
            script: PathBuf::from("check.js"),
            timeout_secs: 10,
        }
    }
}

impl ValidatorConfig {
    /// At least one second, also for configs built in code.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Leading glyphs that mark a passed test. Reporters differ per platform.
    pub pass_glyphs: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            pass_glyphs: vec!["√".into(), "✔".into(), "✓".into()],
        }
    }
}

impl ServiceConfig {
    pub fn project_root(&self) -> &Path {
        &self.project.root
    }

    pub fn validator_script(&self) -> PathBuf {
        self.project.root.join(&self.validator.script)
    }

    /// Overrides the project root, e.g. from a command-line flag.
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project.root = root.into();
        self
    }
}

pub fn load_config(path: &Path) -> Result<ServiceConfig, RunError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| RunError::Config(format!("failed to read config {}: {}", path.display(), e)))?;
    let mut cfg: ServiceConfig = serde_yaml::from_str(&raw)
        .map_err(|e| RunError::Config(format!("failed to parse YAML: {}", e)))?;
    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(RunError::Config(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }
    if cfg.project.contract_file.trim().is_empty() || cfg.project.test_file.trim().is_empty() {
        return Err(RunError::Config(
            "project.contract_file and project.test_file must not be empty".into(),
        ));
    }
    if cfg.validator.timeout_secs == 0 {
        return Err(RunError::Config(
            "validator.timeout_secs must be at least 1".into(),
        ));
    }

    if cfg.project.root.is_relative() {
        let base = path.parent().unwrap_or(Path::new("."));
        cfg.project.root = base.join(&cfg.project.root);
    }
    Ok(cfg)
}

/// Loads `path` if it exists, otherwise falls back to defaults.
pub fn load_config_or_default(path: &Path) -> Result<ServiceConfig, RunError> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(ServiceConfig::default())
    }
}
