// config.rs — Enforcer configuration.
//
// Loaded from `.spendguard/config.toml` when present. Relative paths in the
// file are resolved against the project root. Without a file, `for_project`
// lays everything out under `.spendguard/`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EnforcerError;

/// Configuration for the enforcement orchestrator and its file-backed stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcerConfig {
    /// Directory for the JSON policy store (one file per policy).
    pub policies_dir: PathBuf,

    /// Path to the append-only action log.
    pub action_log: PathBuf,

    /// Upper bound on a single trade-execution call.
    #[serde(default = "default_executor_timeout_secs")]
    pub executor_timeout_secs: u64,

    /// Provenance tag used when a request does not carry one.
    #[serde(default = "default_source")]
    pub default_source: String,
}

fn default_executor_timeout_secs() -> u64 {
    30
}

fn default_source() -> String {
    "local-demo".to_string()
}

impl EnforcerConfig {
    /// Standard `.spendguard/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let dir = project_root.as_ref().join(".spendguard");
        Self {
            policies_dir: dir.join("policies"),
            action_log: dir.join("actions.jsonl"),
            executor_timeout_secs: default_executor_timeout_secs(),
            default_source: default_source(),
        }
    }

    /// Path of the config file for a project.
    pub fn config_path(project_root: impl AsRef<Path>) -> PathBuf {
        project_root.as_ref().join(".spendguard").join("config.toml")
    }

    /// Parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, EnforcerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EnforcerError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| EnforcerError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the project's config file, or fall back to the default layout
    /// if there is none. A file that exists but does not parse is an error.
    pub fn load_for_project(project_root: impl AsRef<Path>) -> Result<Self, EnforcerError> {
        let root = project_root.as_ref();
        let path = Self::config_path(root);
        if !path.exists() {
            return Ok(Self::for_project(root));
        }
        let mut config = Self::load(&path)?;
        config.policies_dir = root.join(&config.policies_dir);
        config.action_log = root.join(&config.action_log);
        Ok(config)
    }

    pub fn executor_timeout(&self) -> Duration {
        Duration::from_secs(self.executor_timeout_secs)
    }
}
