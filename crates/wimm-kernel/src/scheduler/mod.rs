//! Scheduler: asynchronous execution of tool invocations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        JobManager                            │
//! │  jobs: HashMap<JobId, JobInfo>     (one unfinished per label) │
//! │  submit(spec, label) ──▶ tokio::spawn(Worker)  ──▶ JobHandle  │
//! │                              │                               │
//! │                              ▼                               │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ JobRunner                                              │  │
//! │  │  spawn child ─▶ stdout ┐                               │  │
//! │  │               ─▶ stderr ┴─▶ OutputBuffer (merged)       │  │
//! │  │  wait ─▶ classify exit ─▶ JobResult                     │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                              │                               │
//! │        state = Completed ◀───┴──▶ notifier, then handle      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod job;
mod runner;
mod stream;

pub use job::{JobHandle, JobId, JobInfo, JobManager, JobNotification, JobState};
pub use runner::{JobRunner, RunnerConfig};
pub use stream::{DEFAULT_OUTPUT_LIMIT, OutputBuffer, drain_into};
