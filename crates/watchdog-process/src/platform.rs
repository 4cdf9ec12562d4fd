//! ProcessPlatform trait - the OS capabilities the supervisor depends on
//!
//! The supervisor never calls the OS directly. Everything it needs from the
//! operating system goes through this trait:
//! - Validating an executable before it is registered
//! - Snapshotting which executables are currently running
//! - Launching an executable
//! - Forcibly terminating a PID
//!
//! [`SystemPlatform`] is the real implementation. Tests provide an
//! in-memory process table instead.

use crate::execute::launch_executable;
use crate::inspect::{ProcessTable, SystemInspector};
use crate::terminate::{terminate_process, TerminateOutcome};
use crate::validation::validate_executable;
use async_trait::async_trait;
use std::path::Path;
use watchdog_common::ProcessResult;

#[async_trait]
pub trait ProcessPlatform: Send + Sync {
    /// Check that `path` is something that may be launched.
    fn validate_executable(&self, path: &Path) -> ProcessResult<()>;

    /// Point-in-time view of running processes, keyed by executable path.
    async fn snapshot(&self) -> ProcessResult<ProcessTable>;

    /// Start `path` with no arguments, working directory set to its
    /// containing directory. Returns the new PID.
    async fn launch(&self, path: &Path) -> ProcessResult<u32>;

    /// Forcibly terminate `pid` and wait until it is gone.
    ///
    /// A PID that no longer exists yields [`TerminateOutcome::AlreadyExited`].
    async fn terminate(&self, pid: u32) -> ProcessResult<TerminateOutcome>;
}

/// Platform implementation backed by the real operating system.
#[derive(Clone, Default)]
pub struct SystemPlatform {
    inspector: SystemInspector,
}

impl SystemPlatform {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessPlatform for SystemPlatform {
    fn validate_executable(&self, path: &Path) -> ProcessResult<()> {
        validate_executable(path)
    }

    async fn snapshot(&self) -> ProcessResult<ProcessTable> {
        self.inspector.snapshot().await
    }

    async fn launch(&self, path: &Path) -> ProcessResult<u32> {
        launch_executable(path)
    }

    async fn terminate(&self, pid: u32) -> ProcessResult<TerminateOutcome> {
        terminate_process(pid).await
    }
}
