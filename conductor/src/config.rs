//! Engine configuration.
//!
//! Values come from a YAML file when one is found, otherwise from defaults.
//! Lookup order: explicit path, `$CONDUCTOR_CONFIG`, then `config.yaml` in the
//! platform config directory.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable pointing at a config file
pub const CONFIG_ENV_VAR: &str = "CONDUCTOR_CONFIG";

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Model used when neither the caller nor a preset step names one
    pub default_model: String,

    /// Code length (chars) above which the custom workflow pre-optimizes context
    pub context_optimization_threshold: usize,

    /// Code length (chars) above which the chain runner requests a routing plan
    pub chain_routing_threshold: usize,

    /// Token budget handed to the context manager
    pub max_context_tokens: usize,

    /// Default stop policy for the custom workflow
    pub stop_on_error: bool,

    /// Worker pool width for parallel batches and comparisons
    pub max_concurrency: usize,

    /// Default number of mesh rounds
    pub mesh_iterations: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_model: "default".to_string(),
            context_optimization_threshold: 8000,
            chain_routing_threshold: 8000,
            max_context_tokens: 4000,
            stop_on_error: true,
            max_concurrency: 1,
            mesh_iterations: 2,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: OrchestratorConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve and load configuration, falling back to defaults when no file exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            anyhow::bail!("max_concurrency must be at least 1");
        }
        if self.mesh_iterations == 0 {
            anyhow::bail!("mesh_iterations must be at least 1");
        }
        if self.default_model.trim().is_empty() {
            anyhow::bail!("default_model must not be empty");
        }
        Ok(())
    }
}

/// Platform config location, e.g. `~/.config/conductor/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "conductor").map(|dirs| dirs.config_dir().join("config.yaml"))
}
