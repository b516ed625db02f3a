//! wimm-kernel: the core of wimm.
//!
//! This crate provides:
//!
//! - **Locator**: finds imaging tools on a search path or at registered locations
//! - **Selector**: picks the backend for an operation under the configured mode
//! - **Command builder**: renders an operation into one backend's argument list
//! - **Scheduler**: runs commands as background jobs and delivers each result once
//! - **Reports**: parses the listings the tools print
//!
//! [`ImageManager`] ties them together behind one handle.

pub mod command;
pub mod config;
pub mod locator;
pub mod manager;
pub mod report;
pub mod scheduler;
pub mod selector;

pub use command::build_command;
pub use config::ManagerConfig;
pub use locator::{LayeredLocator, SearchPathLocator, ToolLocations, ToolLocator, is_executable};
pub use manager::{ImageManager, ToolStatus};
pub use report::{parse_image_indexes, parse_mounted_images};
pub use scheduler::{
    JobHandle, JobId, JobInfo, JobManager, JobNotification, JobRunner, JobState, RunnerConfig,
};
pub use selector::{DEFAULT_AUTO_ORDER, select_backend};

pub use wimm_types as types;
