//! Timed start/stop of a single registry entry.
//!
//! These run while the registry lock is held, so every OS call is bounded
//! by a timeout. A hung launcher or terminator costs at most one timeout
//! period instead of stalling the registry indefinitely.

use crate::model::WatchedProcess;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use watchdog_common::{ProcessError, ProcessResult};
use watchdog_process::{ProcessPlatform, TerminateOutcome};

/// Bounds on individual OS calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTimeouts {
    /// One launch call, including the pre-launch snapshot.
    pub launch: Duration,
    /// One terminate call, including exit confirmation.
    pub terminate: Duration,
    /// The live-process snapshot taken at the start of a reconcile tick.
    pub snapshot: Duration,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            launch: Duration::from_secs(10),
            terminate: Duration::from_secs(10),
            snapshot: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new instance was launched.
    Launched(u32),
    /// The executable was already running; nothing was launched.
    AlreadyRunning(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// A live process was terminated.
    Terminated(u32),
    /// There was nothing to terminate.
    AlreadyStopped,
}

async fn bounded<T>(
    limit: Duration,
    id: &str,
    operation: &str,
    fut: impl Future<Output = ProcessResult<T>>,
) -> ProcessResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} of {} exceeded {:?}", operation, id, limit);
            Err(ProcessError::timeout(id, operation))
        }
    }
}

/// Launch the entry's executable and record the start.
pub(crate) async fn launch_entry(
    platform: &dyn ProcessPlatform,
    entry: &mut WatchedProcess,
    limit: Duration,
) -> ProcessResult<u32> {
    let pid = bounded(limit, &entry.program_name, "launch", platform.launch(&entry.file_path)).await?;
    entry.mark_started(pid, Utc::now());
    info!("Started {} (PID: {})", entry.program_name, pid);
    Ok(pid)
}

/// Start an entry unless its executable is already running.
///
/// A failed pre-launch snapshot is not fatal; the launch is attempted
/// anyway.
pub(crate) async fn start_entry(
    platform: &dyn ProcessPlatform,
    entry: &mut WatchedProcess,
    limit: Duration,
) -> ProcessResult<StartOutcome> {
    match bounded(limit, &entry.program_name, "snapshot", platform.snapshot()).await {
        Ok(table) => {
            if let Some(pid) = table.lookup(&entry.file_path) {
                debug!("{} already running (PID: {})", entry.program_name, pid);
                entry.mark_running(pid);
                return Ok(StartOutcome::AlreadyRunning(pid));
            }
        }
        Err(e) => warn!("Pre-launch check for {} failed: {}", entry.program_name, e),
    }

    launch_entry(platform, entry, limit).await.map(StartOutcome::Launched)
}

/// Terminate the entry's process, if one is known, and mark it stopped.
///
/// On failure the entry is left untouched.
pub(crate) async fn stop_entry(
    platform: &dyn ProcessPlatform,
    entry: &mut WatchedProcess,
    limit: Duration,
) -> ProcessResult<StopOutcome> {
    let pid = entry.process_id;
    if pid == 0 {
        entry.mark_stopped();
        return Ok(StopOutcome::AlreadyStopped);
    }

    let outcome = bounded(limit, &entry.program_name, "terminate", platform.terminate(pid)).await?;
    entry.mark_stopped();

    Ok(match outcome {
        TerminateOutcome::Terminated => {
            info!("Stopped {} (PID: {})", entry.program_name, pid);
            StopOutcome::Terminated(pid)
        }
        TerminateOutcome::AlreadyExited => {
            debug!("{} (PID: {}) had already exited", entry.program_name, pid);
            StopOutcome::AlreadyStopped
        }
    })
}
