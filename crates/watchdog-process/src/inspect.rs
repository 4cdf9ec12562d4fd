//! Live process inspection.
//!
//! A [`ProcessTable`] is a point-in-time view of which executables are
//! running, keyed by path. Keys are compared case-insensitively, the same
//! way registry entries are keyed.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use sysinfo::{ProcessRefreshKind, System, UpdateKind};
use tracing::debug;
use watchdog_common::{ProcessError, ProcessResult};

/// Normalized, case-insensitive key for an executable path.
pub fn path_key(path: impl AsRef<Path>) -> String {
    path.as_ref().to_string_lossy().to_lowercase()
}

/// Snapshot of live processes: executable path to PID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessTable {
    by_path: HashMap<String, u32>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a live process. When several processes share a path the
    /// lowest PID is kept, which on Linux is the thread-group leader.
    pub fn insert(&mut self, path: impl AsRef<Path>, pid: u32) {
        self.by_path
            .entry(path_key(path))
            .and_modify(|existing| *existing = (*existing).min(pid))
            .or_insert(pid);
    }

    /// Forget a path, returning the PID it mapped to.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> Option<u32> {
        self.by_path.remove(&path_key(path))
    }

    /// PID of the running instance of `path`, if any.
    pub fn lookup(&self, path: impl AsRef<Path>) -> Option<u32> {
        self.by_path.get(&path_key(path)).copied()
    }

    /// Path key currently mapped to `pid`.
    pub fn path_of(&self, pid: u32) -> Option<&str> {
        self.by_path
            .iter()
            .find(|(_, &p)| p == pid)
            .map(|(path, _)| path.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

/// Process inspector backed by `sysinfo`.
///
/// Refreshing the process list is blocking work, so it runs on Tokio's
/// blocking pool.
#[derive(Clone)]
pub struct SystemInspector {
    system: Arc<Mutex<System>>,
}

impl SystemInspector {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }

    /// Take a fresh snapshot of every process with a readable executable path.
    pub async fn snapshot(&self) -> ProcessResult<ProcessTable> {
        let system = Arc::clone(&self.system);

        tokio::task::spawn_blocking(move || {
            let mut system = system.lock();
            system.refresh_processes_specifics(
                ProcessRefreshKind::new().with_exe(UpdateKind::Always),
            );

            let mut table = ProcessTable::new();
            for (pid, process) in system.processes() {
                if let Some(exe) = process.exe() {
                    table.insert(exe, pid.as_u32());
                }
            }

            debug!("Process snapshot: {} executables", table.len());
            table
        })
        .await
        .map_err(|e| ProcessError::snapshot_failed(format!("inspector task failed: {}", e)))
    }
}

impl Default for SystemInspector {
    fn default() -> Self {
        Self::new()
    }
}
