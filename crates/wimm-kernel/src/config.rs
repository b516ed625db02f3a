//! Configuration for the image manager.
//!
//! Loaded from `~/.config/wimm/config.toml`. Every key is optional:
//!
//! ```toml
//! backend = "auto"                  # auto | dism | wimlib
//! auto_order = ["wimlib", "dism"]   # preference order for auto
//! search_dirs = ["C:/tools/wimlib"] # searched before PATH
//! privilege_exit_codes = [740]
//! job_timeout_secs = 3600           # unset: no timeout
//! max_output_bytes = 10485760
//!
//! [tools]
//! wimlib = "C:/tools/wimlib/wimlib-imagex.exe"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use wimm_types::{Backend, BackendMode, ELEVATION_REQUIRED_EXIT_CODE};

use crate::scheduler::{DEFAULT_OUTPUT_LIMIT, RunnerConfig};
use crate::selector::DEFAULT_AUTO_ORDER;

/// Configuration for [`ImageManager`](crate::ImageManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    /// How to choose a backend.
    #[serde(default)]
    pub backend: BackendMode,

    /// Preference order for `backend = "auto"`.
    #[serde(default = "default_auto_order")]
    pub auto_order: Vec<Backend>,

    /// Extra directories searched before `PATH`.
    #[serde(default)]
    pub search_dirs: Vec<PathBuf>,

    /// Explicit executable per backend, checked before any search.
    #[serde(default)]
    pub tools: BTreeMap<Backend, PathBuf>,

    /// Exit codes that mean the tool needs elevated privileges.
    #[serde(default = "default_privilege_exit_codes")]
    pub privilege_exit_codes: Vec<i32>,

    /// Kill jobs running longer than this.
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,

    /// Per-job cap on captured output.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_auto_order() -> Vec<Backend> {
    DEFAULT_AUTO_ORDER.to_vec()
}

fn default_privilege_exit_codes() -> Vec<i32> {
    vec![ELEVATION_REQUIRED_EXIT_CODE]
}

fn default_max_output_bytes() -> usize {
    DEFAULT_OUTPUT_LIMIT
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            backend: BackendMode::default(),
            auto_order: default_auto_order(),
            search_dirs: Vec::new(),
            tools: BTreeMap::new(),
            privilege_exit_codes: default_privilege_exit_codes(),
            job_timeout_secs: None,
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl ManagerConfig {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Get the default config file path.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "wimm")
            .context("Could not determine config directory")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Settings for the job runner.
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            privilege_exit_codes: self.privilege_exit_codes.clone(),
            timeout: self.job_timeout_secs.map(Duration::from_secs),
            max_output_bytes: self.max_output_bytes,
        }
    }
}
