//! Configuration for the atelier orchestrator.
//!
//! Settings live in `.atelier/atelier.toml` under the project
//! directory; every field has a sensible default so the file is
//! optional. CLI flags are layered on top by the command handlers.
//!
//! # Configuration File Format
//!
//! ```toml
//! [core]
//! max_retries = 2
//! max_checkpoints = 50
//! auto_approve = false
//! approval_timeout_secs = 3600
//!
//! [executors]
//! design = "python3 tools/design_agent.py"
//! build = "python3 tools/codegen.py"
//! qa = "npx playwright test --reporter=json"
//! publish = "python3 tools/package.py"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-project directory holding config and run data.
pub const ATELIER_DIR: &str = ".atelier";
/// Configuration file name inside the atelier directory.
pub const CONFIG_FILE: &str = "atelier.toml";

/// Core orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreSection {
    /// Retries per phase after the initial attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Checkpoints retained per workflow before pruning.
    #[serde(default = "default_max_checkpoints")]
    pub max_checkpoints: usize,
    /// Bypass all approval gates (unattended runs).
    #[serde(default)]
    pub auto_approve: bool,
    /// Upper bound on waiting for one gate decision. Unset waits
    /// indefinitely.
    #[serde(default)]
    pub approval_timeout_secs: Option<u64>,
}

fn default_max_retries() -> u32 {
    2
}

fn default_max_checkpoints() -> usize {
    50
}

impl Default for CoreSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_checkpoints: default_max_checkpoints(),
            auto_approve: false,
            approval_timeout_secs: None,
        }
    }
}

/// Command lines for the subprocess-backed executors, one per phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorsSection {
    #[serde(default)]
    pub design: Option<String>,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub qa: Option<String>,
    #[serde(default)]
    pub publish: Option<String>,
}

/// On-disk form of `.atelier/atelier.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AtelierToml {
    #[serde(default)]
    pub core: CoreSection,
    #[serde(default)]
    pub executors: ExecutorsSection,
}

impl AtelierToml {
    /// Load the file, or defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Runtime configuration: the parsed file plus resolved paths.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub atelier_dir: PathBuf,
    pub state_root: PathBuf,
    pub checkpoint_root: PathBuf,
    pub max_retries: u32,
    pub max_checkpoints: usize,
    pub auto_approve: bool,
    pub approval_timeout_secs: Option<u64>,
    pub executors: ExecutorsSection,
}

impl Config {
    /// Resolve configuration for a project directory.
    pub fn load(project_dir: impl Into<PathBuf>) -> Result<Self> {
        let project_dir: PathBuf = project_dir.into();
        let atelier_dir = project_dir.join(ATELIER_DIR);
        let file = AtelierToml::load_or_default(&atelier_dir.join(CONFIG_FILE))?;

        Ok(Self {
            state_root: atelier_dir.join("state"),
            checkpoint_root: atelier_dir.join("checkpoints"),
            project_dir,
            atelier_dir,
            max_retries: file.core.max_retries,
            max_checkpoints: file.core.max_checkpoints,
            auto_approve: file.core.auto_approve,
            approval_timeout_secs: file.core.approval_timeout_secs,
            executors: file.executors,
        })
    }

    /// Apply CLI-level overrides on top of the file values.
    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        if auto_approve {
            self.auto_approve = true;
        }
        self
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.state_root)
            .context("Failed to create state directory")?;
        std::fs::create_dir_all(&self.checkpoint_root)
            .context("Failed to create checkpoint directory")?;
        Ok(())
    }
}
