//! Job registry: submit tool runs, track them, deliver each result once.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify, mpsc, oneshot};

use wimm_types::{Backend, CommandSpec, JobOutcome, JobResult, WimError, WimResult};

use super::runner::JobRunner;

/// Unique identifier for a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a job is in its life: `Pending → Running → Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Completed(JobOutcome),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed(_))
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Completed(JobOutcome::Success) => write!(f, "done"),
            JobState::Completed(JobOutcome::Failure) => write!(f, "failed"),
            JobState::Completed(JobOutcome::PrivilegeRequired) => {
                write!(f, "privilege-required")
            }
        }
    }
}

/// Snapshot of a job for listing.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub id: JobId,
    /// Slot label; at most one unfinished job per label.
    pub label: String,
    pub backend: Backend,
    /// Rendered command line.
    pub command: String,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Lifecycle events for an observer such as a UI.
#[derive(Debug, Clone)]
pub enum JobNotification {
    Started { id: JobId, label: String },
    Completed {
        id: JobId,
        label: String,
        result: JobResult,
    },
}

/// An in-flight job. Await it (or call [`JobHandle::wait`]) for the result.
///
/// The result can be taken only once: awaiting consumes the handle.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    label: String,
    rx: oneshot::Receiver<JobResult>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Wait for the job to finish.
    pub async fn wait(self) -> JobResult {
        self.await
    }
}

impl Future for JobHandle {
    type Output = JobResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                JobResult::launch_failure("job worker ended without reporting a result")
            })
        })
    }
}

/// Runs jobs on their own tasks and keeps the registry of slots.
///
/// One task per job, no pool: jobs come from interactive requests and are
/// few. A submission whose label matches an unfinished job is rejected with
/// [`WimError::SlotBusy`]; different labels never wait on each other.
pub struct JobManager {
    next_id: AtomicU64,
    jobs: Arc<Mutex<HashMap<JobId, JobInfo>>>,
    runner: Arc<JobRunner>,
    notifier: Option<mpsc::UnboundedSender<JobNotification>>,
    finished: Arc<Notify>,
}

impl JobManager {
    pub fn new(runner: JobRunner) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            runner: Arc::new(runner),
            notifier: None,
            finished: Arc::new(Notify::new()),
        }
    }

    /// Also report start and completion of every job on `tx`.
    pub fn with_notifier(mut self, tx: mpsc::UnboundedSender<JobNotification>) -> Self {
        self.set_notifier(tx);
        self
    }

    /// Replace the notification channel for jobs submitted from now on.
    pub fn set_notifier(&mut self, tx: mpsc::UnboundedSender<JobNotification>) {
        self.notifier = Some(tx);
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    /// Start `spec` in the background under the slot `label`.
    ///
    /// Returns as soon as the job is registered. Errors are synchronous and
    /// mean nothing was spawned.
    pub async fn submit(&self, spec: CommandSpec, label: impl Into<String>) -> WimResult<JobHandle> {
        let label = label.into();
        if !spec.is_runnable() {
            return Err(WimError::InvalidOperation(format!(
                "{}: command has no executable",
                label
            )));
        }

        let id = {
            let mut jobs = self.jobs.lock().await;
            if jobs
                .values()
                .any(|job| job.label == label && !job.state.is_terminal())
            {
                return Err(WimError::SlotBusy(label));
            }

            let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
            jobs.insert(
                id,
                JobInfo {
                    id,
                    label: label.clone(),
                    backend: spec.backend,
                    command: spec.to_string(),
                    state: JobState::Pending,
                    submitted_at: Utc::now(),
                    finished_at: None,
                },
            );
            id
        };

        let (tx, rx) = oneshot::channel();
        let worker = Worker {
            id,
            label: label.clone(),
            jobs: self.jobs.clone(),
            runner: self.runner.clone(),
            notifier: self.notifier.clone(),
            finished: self.finished.clone(),
        };
        tokio::spawn(worker.run(spec, tx));

        Ok(JobHandle { id, label, rx })
    }

    /// All known jobs, oldest first.
    pub async fn list(&self) -> Vec<JobInfo> {
        let jobs = self.jobs.lock().await;
        let mut list: Vec<JobInfo> = jobs.values().cloned().collect();
        list.sort_by_key(|job| job.id);
        list
    }

    /// Info for one job.
    pub async fn get(&self, id: JobId) -> Option<JobInfo> {
        self.jobs.lock().await.get(&id).cloned()
    }

    /// Number of jobs not yet completed.
    pub async fn running_count(&self) -> usize {
        let jobs = self.jobs.lock().await;
        jobs.values().filter(|job| !job.state.is_terminal()).count()
    }

    /// Wait until no job is pending or running.
    pub async fn wait_idle(&self) {
        loop {
            let finished = self.finished.notified();
            if self.running_count().await == 0 {
                return;
            }
            finished.await;
        }
    }

    /// Forget completed jobs.
    pub async fn cleanup(&self) {
        let mut jobs = self.jobs.lock().await;
        jobs.retain(|_, job| !job.state.is_terminal());
    }
}

/// The task side of one job.
struct Worker {
    id: JobId,
    label: String,
    jobs: Arc<Mutex<HashMap<JobId, JobInfo>>>,
    runner: Arc<JobRunner>,
    notifier: Option<mpsc::UnboundedSender<JobNotification>>,
    finished: Arc<Notify>,
}

impl Worker {
    async fn run(self, spec: CommandSpec, tx: oneshot::Sender<JobResult>) {
        self.set_state(JobState::Running).await;
        tracing::info!(job = %self.id, label = %self.label, command = %spec, "job started");
        self.notify(JobNotification::Started {
            id: self.id,
            label: self.label.clone(),
        });

        let result = self.runner.run(&spec).await;
        let outcome = result.outcome();

        self.set_state(JobState::Completed(outcome)).await;
        tracing::info!(
            job = %self.id,
            label = %self.label,
            outcome = %outcome,
            exit_code = ?result.exit_code,
            "job finished"
        );
        self.finished.notify_waiters();
        self.notify(JobNotification::Completed {
            id: self.id,
            label: self.label.clone(),
            result: result.clone(),
        });

        if tx.send(result).is_err() {
            tracing::debug!(job = %self.id, "job handle dropped before completion");
        }
    }

    async fn set_state(&self, state: JobState) {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.get_mut(&self.id) {
            job.state = state;
            if state.is_terminal() {
                job.finished_at = Some(Utc::now());
            }
        }
    }

    fn notify(&self, notification: JobNotification) {
        let Some(tx) = &self.notifier else {
            return;
        };
        if tx.send(notification).is_err() {
            tracing::debug!(job = %self.id, "job notification receiver closed");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use wimm_types::{CommandIntent, SpecialCode};

    fn sh(script: &str) -> CommandSpec {
        let mut spec = CommandSpec::new(Backend::Wimlib, CommandIntent::Mount)
            .arg("-c")
            .arg(script);
        spec.program = "/bin/sh".to_string();
        spec
    }

    fn manager() -> JobManager {
        JobManager::new(JobRunner::default())
    }

    #[tokio::test]
    async fn submit_and_wait() {
        let jobs = manager();
        let handle = jobs.submit(sh("echo done"), "mount /mnt/a").await.unwrap();
        assert_eq!(handle.label(), "mount /mnt/a");
        let id = handle.id();

        let result = handle.wait().await;
        assert!(result.succeeded);
        assert_eq!(result.output.trim(), "done");

        let info = jobs.get(id).await.unwrap();
        assert_eq!(info.state, JobState::Completed(JobOutcome::Success));
        assert!(info.finished_at.is_some());
    }

    #[tokio::test]
    async fn busy_slot_is_rejected() {
        let jobs = manager();
        let first = jobs.submit(sh("sleep 0.3"), "unmount /mnt/a").await.unwrap();

        let second = jobs.submit(sh("true"), "unmount /mnt/a").await;
        assert_eq!(second.unwrap_err(), WimError::SlotBusy("unmount /mnt/a".into()));

        // Other slots are unaffected
        let other = jobs.submit(sh("true"), "mount /mnt/a").await.unwrap();
        assert!(other.await.succeeded);

        assert!(first.await.succeeded);
        // Slot is free again once the job completed
        assert!(jobs.submit(sh("true"), "unmount /mnt/a").await.is_ok());
    }

    #[tokio::test]
    async fn submit_returns_before_process_exits() {
        let jobs = manager();
        let handle = jobs.submit(sh("sleep 0.3"), "slow").await.unwrap();
        assert_eq!(jobs.running_count().await, 1);
        let state = jobs.get(handle.id()).await.unwrap().state;
        assert!(matches!(state, JobState::Pending | JobState::Running));
        handle.await;
        assert_eq!(jobs.running_count().await, 0);
    }

    #[tokio::test]
    async fn notifications_arrive_once_after_exit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let jobs = manager().with_notifier(tx);
        let handle = jobs.submit(sh("echo hi; exit 4"), "list-mounts").await.unwrap();
        let id = handle.id();
        let result = handle.await;

        let started = rx.recv().await.unwrap();
        assert!(matches!(started, JobNotification::Started { id: got, .. } if got == id));
        match rx.recv().await.unwrap() {
            JobNotification::Completed { id: got, result: notified, .. } => {
                assert_eq!(got, id);
                assert_eq!(notified, result);
            }
            other => panic!("expected completion, got {:?}", other),
        }
        drop(jobs);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_jobs_are_terminal_and_not_retried() {
        let jobs = manager();
        let handle = jobs.submit(sh("exit 1"), "mount /mnt/b").await.unwrap();
        let id = handle.id();
        let result = handle.await;
        assert!(!result.succeeded);
        assert_eq!(result.special, None::<SpecialCode>);

        let info = jobs.get(id).await.unwrap();
        assert_eq!(info.state, JobState::Completed(JobOutcome::Failure));
        assert_eq!(jobs.list().await.len(), 1);
    }

    #[tokio::test]
    async fn unrunnable_spec_is_rejected_synchronously() {
        let jobs = manager();
        let mut spec = sh("");
        spec.program = " ".to_string();
        let err = jobs.submit(spec, "mount /mnt/c").await.unwrap_err();
        assert!(matches!(err, WimError::InvalidOperation(_)));
        assert!(jobs.list().await.is_empty());
    }

    #[tokio::test]
    async fn wait_idle_and_cleanup() {
        let jobs = manager();
        let _a = jobs.submit(sh("sleep 0.1"), "a").await.unwrap();
        let _b = jobs.submit(sh("sleep 0.2"), "b").await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), jobs.wait_idle())
            .await
            .unwrap();
        assert_eq!(jobs.running_count().await, 0);
        assert_eq!(jobs.list().await.len(), 2);

        jobs.cleanup().await;
        assert!(jobs.list().await.is_empty());
    }
}
