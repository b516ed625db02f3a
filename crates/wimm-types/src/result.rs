//! JobResult: the classified outcome of one external tool run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Windows `ERROR_ELEVATION_REQUIRED`: the tool must run as administrator.
pub const ELEVATION_REQUIRED_EXIT_CODE: i32 = 740;

/// A distinguished condition the caller should handle specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpecialCode {
    /// The tool exited with a privilege-required code; suggest elevation
    /// rather than showing raw output.
    PrivilegeRequired,
    /// The job hit the configured time limit and the child was killed.
    TimedOut,
    /// The child was killed by a signal and has no exit code.
    Terminated,
}

/// Terminal classification used by the job state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobOutcome {
    Success,
    Failure,
    PrivilegeRequired,
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Success => f.write_str("success"),
            JobOutcome::Failure => f.write_str("failure"),
            JobOutcome::PrivilegeRequired => f.write_str("privilege-required"),
        }
    }
}

/// The result of running one job.
///
/// Created once, immutable, delivered exactly once. Callers branch on the
/// fields (or on [`JobResult::failure`]) rather than on an error type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Process exit code; `None` when the process never launched or has no
    /// code (timeout kill, signal).
    pub exit_code: Option<i32>,
    /// Standard output and standard error, merged and lossily decoded.
    pub output: String,
    /// True only for exit code 0.
    pub succeeded: bool,
    /// Distinguished condition, if any.
    pub special: Option<SpecialCode>,
}

impl JobResult {
    /// Classify a process that ran to completion.
    ///
    /// Exit 0 always succeeds. A code listed in `privilege_codes` becomes
    /// [`SpecialCode::PrivilegeRequired`] whatever the output says.
    pub fn from_exit(exit_code: i32, output: impl Into<String>, privilege_codes: &[i32]) -> Self {
        let special = if exit_code != 0 && privilege_codes.contains(&exit_code) {
            Some(SpecialCode::PrivilegeRequired)
        } else {
            None
        };
        Self {
            exit_code: Some(exit_code),
            output: output.into(),
            succeeded: exit_code == 0,
            special,
        }
    }

    /// The process could not be spawned.
    pub fn launch_failure(detail: impl Into<String>) -> Self {
        Self {
            exit_code: None,
            output: detail.into(),
            succeeded: false,
            special: None,
        }
    }

    /// The process was killed after exceeding the time limit.
    pub fn timed_out(output: impl Into<String>) -> Self {
        Self {
            exit_code: None,
            output: output.into(),
            succeeded: false,
            special: Some(SpecialCode::TimedOut),
        }
    }

    /// The process ended without an exit code (killed by a signal).
    pub fn terminated(output: impl Into<String>) -> Self {
        Self {
            exit_code: None,
            output: output.into(),
            succeeded: false,
            special: Some(SpecialCode::Terminated),
        }
    }

    /// True when the caller should suggest running elevated.
    pub fn needs_privilege(&self) -> bool {
        self.special == Some(SpecialCode::PrivilegeRequired)
    }

    /// Terminal state for the job state machine.
    pub fn outcome(&self) -> JobOutcome {
        if self.succeeded {
            JobOutcome::Success
        } else if self.needs_privilege() {
            JobOutcome::PrivilegeRequired
        } else {
            JobOutcome::Failure
        }
    }

    /// Map a failed result onto the error taxonomy; `None` on success.
    pub fn failure(&self) -> Option<JobFailure> {
        if self.succeeded {
            return None;
        }
        let failure = match (self.special, self.exit_code) {
            (Some(SpecialCode::PrivilegeRequired), code) => JobFailure::PrivilegeRequired {
                exit_code: code.unwrap_or_default(),
            },
            (Some(SpecialCode::TimedOut), _) => JobFailure::TimedOut {
                output: self.output.clone(),
            },
            (Some(SpecialCode::Terminated), _) => JobFailure::Process {
                exit_code: None,
                output: self.output.clone(),
            },
            (None, None) => JobFailure::Launch(self.output.clone()),
            (None, Some(code)) => JobFailure::Process {
                exit_code: Some(code),
                output: self.output.clone(),
            },
        };
        Some(failure)
    }
}

/// Why a job failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// The process could not be spawned.
    Launch(String),
    /// The process ran and did not succeed.
    Process {
        exit_code: Option<i32>,
        output: String,
    },
    /// The process reported that it needs elevated privileges.
    PrivilegeRequired { exit_code: i32 },
    /// The process exceeded the configured time limit.
    TimedOut { output: String },
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobFailure::Launch(detail) => write!(f, "launch failed: {}", detail),
            JobFailure::Process {
                exit_code: Some(code),
                ..
            } => write!(f, "exited with code {}", code),
            JobFailure::Process { exit_code: None, .. } => f.write_str("terminated by signal"),
            JobFailure::PrivilegeRequired { exit_code } => write!(
                f,
                "exited with code {}: administrator privileges required",
                exit_code
            ),
            JobFailure::TimedOut { .. } => f.write_str("timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVILEGE: &[i32] = &[ELEVATION_REQUIRED_EXIT_CODE];

    #[test]
    fn zero_is_success_and_never_privileged() {
        let result = JobResult::from_exit(0, "ok", &[0, ELEVATION_REQUIRED_EXIT_CODE]);
        assert!(result.succeeded);
        assert_eq!(result.special, None);
        assert_eq!(result.outcome(), JobOutcome::Success);
        assert_eq!(result.failure(), None);
    }

    #[test]
    fn privilege_code_wins_over_output() {
        let result = JobResult::from_exit(740, "The operation completed successfully.", PRIVILEGE);
        assert!(!result.succeeded);
        assert!(result.needs_privilege());
        assert_eq!(result.outcome(), JobOutcome::PrivilegeRequired);
        assert_eq!(
            result.failure(),
            Some(JobFailure::PrivilegeRequired { exit_code: 740 })
        );
    }

    #[test]
    fn other_codes_are_generic_failures() {
        let result = JobResult::from_exit(2, "Error: 2\nThe system cannot find the file", PRIVILEGE);
        assert!(!result.succeeded);
        assert_eq!(result.special, None);
        match result.failure() {
            Some(JobFailure::Process { exit_code, output }) => {
                assert_eq!(exit_code, Some(2));
                assert!(output.contains("cannot find"));
            }
            other => panic!("expected process failure, got {:?}", other),
        }
    }

    #[test]
    fn launch_failure_has_no_exit_code() {
        let result = JobResult::launch_failure("No such file or directory (os error 2)");
        assert_eq!(result.exit_code, None);
        assert!(!result.succeeded);
        assert!(matches!(result.failure(), Some(JobFailure::Launch(_))));
    }

    #[test]
    fn timeout_is_distinct_from_launch_failure() {
        let result = JobResult::timed_out("partial");
        assert_eq!(result.special, Some(SpecialCode::TimedOut));
        assert!(matches!(result.failure(), Some(JobFailure::TimedOut { .. })));
        assert_eq!(result.outcome(), JobOutcome::Failure);
    }

    #[test]
    fn serializes_with_kebab_case_codes() {
        let result = JobResult::from_exit(740, "", PRIVILEGE);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["special"], "privilege-required");
        assert_eq!(json["exit_code"], 740);
    }
}
