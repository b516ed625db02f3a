//! Job runner: run one tool invocation and classify what happened.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use wimm_types::{CommandSpec, ELEVATION_REQUIRED_EXIT_CODE, JobResult};

use super::stream::{DEFAULT_OUTPUT_LIMIT, OutputBuffer, drain_into};

/// Windows `CREATE_NO_WINDOW`: keep console tools from flashing a window.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Settings for [`JobRunner`].
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Exit codes meaning "run me elevated".
    pub privilege_exit_codes: Vec<i32>,
    /// Kill the child after this long. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Maximum bytes of merged output kept per job.
    pub max_output_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            privilege_exit_codes: vec![ELEVATION_REQUIRED_EXIT_CODE],
            timeout: None,
            max_output_bytes: DEFAULT_OUTPUT_LIMIT,
        }
    }
}

/// Executes a [`CommandSpec`] as a child process.
///
/// Never fails: spawn errors, timeouts and nonzero exits all come back as a
/// classified [`JobResult`].
#[derive(Debug, Clone, Default)]
pub struct JobRunner {
    config: RunnerConfig,
}

impl JobRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run the command to completion.
    ///
    /// stdout and stderr are merged into one capture; stdin is closed.
    pub async fn run(&self, spec: &CommandSpec) -> JobResult {
        if !spec.is_runnable() {
            return JobResult::launch_failure("no executable to run");
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return JobResult::launch_failure(format!(
                    "failed to launch {}: {}",
                    spec.program, e
                ));
            }
        };

        let output = OutputBuffer::new(self.config.max_output_bytes);
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let completed = async {
            tokio::join!(drain_into(stdout, &output), drain_into(stderr, &output));
            child.wait().await
        };

        let waited = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, completed).await.ok(),
            None => Some(completed.await),
        };

        let Some(status) = waited else {
            let limit = self.config.timeout.unwrap_or_default();
            tracing::warn!(command = %spec, "timed out after {:?}, killing", limit);
            if let Err(e) = child.kill().await {
                tracing::warn!("failed to kill timed-out child: {}", e);
            }
            return JobResult::timed_out(output.read_string().await);
        };

        let text = output.read_string().await;
        match status {
            Ok(status) => match status.code() {
                Some(code) => JobResult::from_exit(code, text, &self.config.privilege_exit_codes),
                None => JobResult::terminated(text),
            },
            Err(e) => JobResult::launch_failure(format!(
                "failed to wait for {}: {}\n{}",
                spec.program, e, text
            )),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use wimm_types::{Backend, CommandIntent, SpecialCode};

    fn sh(script: &str) -> CommandSpec {
        let mut spec = CommandSpec::new(Backend::Wimlib, CommandIntent::ListIndexes)
            .arg("-c")
            .arg(script);
        spec.program = "/bin/sh".to_string();
        spec
    }

    #[tokio::test]
    async fn exit_zero_succeeds() {
        let result = JobRunner::default().run(&sh("echo mounted")).await;
        assert!(result.succeeded);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.special, None);
        assert_eq!(result.output.trim(), "mounted");
    }

    #[tokio::test]
    async fn merges_stdout_and_stderr() {
        let result = JobRunner::default()
            .run(&sh("echo to-stdout; echo to-stderr >&2; exit 3"))
            .await;
        assert!(!result.succeeded);
        assert_eq!(result.exit_code, Some(3));
        assert!(result.output.contains("to-stdout"));
        assert!(result.output.contains("to-stderr"));
    }

    #[tokio::test]
    async fn configured_privilege_code_is_flagged() {
        let runner = JobRunner::new(RunnerConfig {
            privilege_exit_codes: vec![77],
            ..RunnerConfig::default()
        });
        let result = runner.run(&sh("echo 'all good'; exit 77")).await;
        assert!(!result.succeeded);
        assert_eq!(result.special, Some(SpecialCode::PrivilegeRequired));
        assert_eq!(result.exit_code, Some(77));
    }

    #[tokio::test]
    async fn missing_executable_is_launch_failure() {
        let mut spec = sh("");
        spec.program = "/nonexistent/wimlib-imagex".to_string();
        let result = JobRunner::default().run(&spec).await;
        assert_eq!(result.exit_code, None);
        assert!(!result.succeeded);
        assert!(result.output.contains("failed to launch /nonexistent/wimlib-imagex"));
    }

    #[tokio::test]
    async fn blank_program_never_spawns() {
        let mut spec = sh("");
        spec.program = String::new();
        let result = JobRunner::default().run(&spec).await;
        assert_eq!(result.exit_code, None);
        assert!(!result.succeeded);
    }

    #[tokio::test]
    async fn timeout_kills_child() {
        let runner = JobRunner::new(RunnerConfig {
            timeout: Some(Duration::from_millis(100)),
            ..RunnerConfig::default()
        });
        let result = runner.run(&sh("echo started; exec sleep 5")).await;
        assert_eq!(result.special, Some(SpecialCode::TimedOut));
        assert_eq!(result.exit_code, None);
        assert!(result.output.contains("started"));
    }

    #[tokio::test]
    async fn signal_death_is_terminated() {
        let result = JobRunner::default().run(&sh("kill -9 $$")).await;
        assert_eq!(result.special, Some(SpecialCode::Terminated));
        assert_eq!(result.exit_code, None);
    }
}
