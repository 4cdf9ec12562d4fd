//! Error types for the watchdog crates.
//!
//! Every failure the supervisor can run into falls into one of a few
//! categories:
//!
//! - **Validation**: bad or missing executable, duplicate path, unknown
//!   program name, unknown command. Reported back to the controller.
//! - **Launch / terminate**: the OS refused to start or kill a process.
//!   Reported and logged, registry state stays consistent.
//! - **Snapshot**: the process inspector failed. Only the current
//!   reconciliation tick is abandoned.
//! - **Persistence**: the registry file could not be written. Logged,
//!   the in-memory registry stays authoritative.
//!
//! ```rust
//! use watchdog_common::{ProcessError, ProcessResult};
//!
//! fn lookup(name: &str) -> ProcessResult<u32> {
//!     Err(ProcessError::not_found(name))
//! }
//!
//! let err = lookup("notepad").unwrap_err();
//! assert!(err.is_validation());
//! ```

use thiserror::Error;

/// Process-level errors raised by the registry, the reconciler and the
/// OS collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("program {id} not found")]
    NotFound { id: String },

    #[error("process {id} already registered")]
    AlreadyExists { id: String },

    #[error("invalid executable {path}: {reason}")]
    InvalidExecutable { path: String, reason: String },

    #[error("unknown command {code}")]
    UnknownCommand { code: i32 },

    #[error("failed to launch {path}: {reason}")]
    LaunchFailed { path: String, reason: String },

    #[error("failed to terminate PID {pid}: {reason}")]
    TerminateFailed { pid: u32, reason: String },

    #[error("process snapshot failed: {reason}")]
    SnapshotFailed { reason: String },

    #[error("{operation} timed out for {id}")]
    Timeout { id: String, operation: String },

    #[error("registry file {path}: {reason}")]
    Persistence { path: String, reason: String },
}

impl ProcessError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    pub fn invalid_executable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidExecutable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_command(code: i32) -> Self {
        Self::UnknownCommand { code }
    }

    pub fn launch_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LaunchFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn terminate_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::TerminateFailed {
            pid,
            reason: reason.into(),
        }
    }

    pub fn snapshot_failed(reason: impl Into<String>) -> Self {
        Self::SnapshotFailed {
            reason: reason.into(),
        }
    }

    pub fn timeout(id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Timeout {
            id: id.into(),
            operation: operation.into(),
        }
    }

    pub fn persistence(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's input rather than by the OS
    /// or the filesystem.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::AlreadyExists { .. }
                | Self::InvalidExecutable { .. }
                | Self::UnknownCommand { .. }
        )
    }
}

/// Result type for process operations.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_construction() {
        let error = ProcessError::not_found("notepad");
        assert!(matches!(error, ProcessError::NotFound { .. }));
        assert_eq!(error.to_string(), "program notepad not found");

        let error = ProcessError::launch_failed("/opt/app/server", "permission denied");
        assert!(matches!(error, ProcessError::LaunchFailed { .. }));
        assert!(error.to_string().contains("failed to launch /opt/app/server"));
    }

    #[test]
    fn test_validation_classification() {
        assert!(ProcessError::already_exists("/bin/x").is_validation());
        assert!(ProcessError::unknown_command(9).is_validation());
        assert!(ProcessError::invalid_executable("/bin/x", "missing").is_validation());

        assert!(!ProcessError::snapshot_failed("inspector down").is_validation());
        assert!(!ProcessError::terminate_failed(42, "EPERM").is_validation());
        assert!(!ProcessError::timeout("X", "launch").is_validation());
    }

    #[test]
    fn test_timeout_message() {
        let error = ProcessError::timeout("server", "terminate");
        assert_eq!(error.to_string(), "terminate timed out for server");
    }
}
