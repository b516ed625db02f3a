//! Synchronous errors raised before a job is ever spawned.

use thiserror::Error;

use crate::backend::Backend;
use crate::operation::OperationKind;

/// Result type for core operations.
pub type WimResult<T> = Result<T, WimError>;

/// Errors from backend selection, command building and job submission.
///
/// Anything that happens after the child process is launched is reported
/// through a [`JobResult`](crate::JobResult) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WimError {
    /// No usable tool for the requested backend; `"none"` in auto mode.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend has no way to perform this operation.
    #[error("{backend} cannot perform {operation}")]
    UnsupportedOperationForBackend {
        backend: Backend,
        operation: OperationKind,
    },

    /// The operation or command is missing something it needs.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A job with this label is already pending or running.
    #[error("job slot busy: {0}")]
    SlotBusy(String),
}

impl WimError {
    /// `BackendUnavailable` naming a specific backend.
    pub fn unavailable(backend: Backend) -> Self {
        WimError::BackendUnavailable(backend.name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_backend() {
        assert_eq!(
            WimError::unavailable(Backend::Wimlib).to_string(),
            "backend unavailable: wimlib"
        );
        let err = WimError::UnsupportedOperationForBackend {
            backend: Backend::Wimlib,
            operation: OperationKind::ListMounts,
        };
        assert_eq!(err.to_string(), "wimlib cannot perform list-mounts");
    }
}
