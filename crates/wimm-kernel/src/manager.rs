//! The image manager: the core's front door.
//!
//! Owns and coordinates the core components:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ImageManager                          │
//! │  ┌──────────────┐  ┌───────────────┐  ┌──────────────────┐   │
//! │  │ BackendMode  │  │ ToolLocator   │  │ ToolLocations    │   │
//! │  │ auto_order   │  │ (search path) │  │ (registered)     │   │
//! │  └──────────────┘  └───────────────┘  └──────────────────┘   │
//! │          │ select_backend ─▶ build_command ─▶ submit_job      │
//! │          ▼                                                   │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │ JobManager ─▶ JobRunner ─▶ JobResult (once)          │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use tokio::sync::mpsc;

use wimm_types::{
    Backend, BackendMode, CommandSpec, Operation, OperationKind, WimError, WimResult,
};

use crate::command;
use crate::config::ManagerConfig;
use crate::locator::{LayeredLocator, SearchPathLocator, ToolLocations, ToolLocator, is_executable};
use crate::scheduler::{JobHandle, JobManager, JobNotification, JobRunner};
use crate::selector;

/// Whether one backend's tool was found, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub backend: Backend,
    pub path: Option<PathBuf>,
}

/// Selects backends, builds commands and runs them as background jobs.
pub struct ImageManager {
    mode: RwLock<BackendMode>,
    auto_order: Vec<Backend>,
    locator: Arc<dyn ToolLocator>,
    locations: RwLock<ToolLocations>,
    jobs: JobManager,
}

impl ImageManager {
    /// Create a manager that searches `config.search_dirs`, then `PATH`.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        let locator = SearchPathLocator::from_env().with_extra_dirs(config.search_dirs.clone());
        tracing::debug!(dirs = locator.dirs().len(), "tool search path");
        Ok(Self::with_locator(config, Arc::new(locator)))
    }

    /// Create a manager with a custom locator.
    pub fn with_locator(config: ManagerConfig, locator: Arc<dyn ToolLocator>) -> Self {
        let locations = config.tools.clone().into_iter().collect();
        Self {
            mode: RwLock::new(config.backend),
            auto_order: config.auto_order.clone(),
            locator,
            locations: RwLock::new(locations),
            jobs: JobManager::new(JobRunner::new(config.runner_config())),
        }
    }

    /// Also report job lifecycle events on `tx`.
    pub fn with_notifier(mut self, tx: mpsc::UnboundedSender<JobNotification>) -> Self {
        self.jobs.set_notifier(tx);
        self
    }

    /// Current backend mode.
    pub fn mode(&self) -> BackendMode {
        *self.mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the backend mode for operations started from now on.
    pub fn set_mode(&self, mode: BackendMode) {
        *self.mode.write().unwrap_or_else(PoisonError::into_inner) = mode;
        tracing::info!(%mode, "backend mode changed");
    }

    /// Find an executable by name on the search path.
    pub fn locate_tool(&self, name: &str) -> Option<PathBuf> {
        self.locator.locate(name)
    }

    /// Find a backend's executable: registered location first, then search.
    pub fn locate_backend(&self, backend: Backend) -> Option<PathBuf> {
        let locations = self.locations.read().unwrap_or_else(PoisonError::into_inner);
        LayeredLocator::new(&locations, self.locator.as_ref()).locate_backend(backend)
    }

    /// Record where a backend's executable lives.
    ///
    /// This is how a freshly installed tool becomes usable without touching
    /// the process `PATH`.
    pub fn register_tool(&self, backend: Backend, path: PathBuf) -> WimResult<()> {
        if !is_executable(&path) {
            return Err(WimError::InvalidOperation(format!(
                "{} is not an executable file",
                path.display()
            )));
        }
        tracing::info!(%backend, path = %path.display(), "registered tool location");
        self.locations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(backend, path);
        Ok(())
    }

    /// Availability of every backend, for display.
    pub fn detect_tools(&self) -> Vec<ToolStatus> {
        Backend::ALL
            .iter()
            .map(|&backend| {
                let path = self.locate_backend(backend);
                match &path {
                    Some(found) => {
                        tracing::info!(%backend, path = %found.display(), "tool found")
                    }
                    None => tracing::info!(%backend, "tool not found"),
                }
                ToolStatus { backend, path }
            })
            .collect()
    }

    /// Pick the backend for an operation of `kind` under the current mode.
    pub fn select_backend(&self, kind: OperationKind) -> WimResult<Backend> {
        let locations = self.locations.read().unwrap_or_else(PoisonError::into_inner);
        let locator = LayeredLocator::new(&locations, self.locator.as_ref());
        selector::select_backend(self.mode(), kind, &self.auto_order, &locator)
    }

    /// Render `operation` for `backend`.
    pub fn build_command(&self, backend: Backend, operation: &Operation) -> WimResult<CommandSpec> {
        command::build_command(backend, operation)
    }

    /// Run a command in the background under the slot `label`.
    pub async fn submit_job(&self, spec: CommandSpec, label: impl Into<String>) -> WimResult<JobHandle> {
        self.jobs.submit(spec, label).await
    }

    /// Select, build and submit in one go.
    ///
    /// Every synchronous failure happens before anything is spawned. The
    /// command runs the located executable path, not a bare name.
    pub async fn run(&self, operation: &Operation) -> WimResult<JobHandle> {
        let backend = self.select_backend(operation.kind())?;
        let spec = command::build_command(backend, operation)?;
        let program = self
            .locate_backend(backend)
            .ok_or_else(|| WimError::unavailable(backend))?;
        self.jobs
            .submit(spec.with_program(&program), operation.label())
            .await
    }

    /// The job registry.
    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }
}

impl std::fmt::Debug for ImageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageManager")
            .field("mode", &self.mode())
            .field("auto_order", &self.auto_order)
            .finish()
    }
}
