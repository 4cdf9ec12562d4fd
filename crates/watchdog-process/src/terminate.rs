//! Process termination.
//!
//! The watchdog only ever terminates forcibly (SIGKILL on Unix,
//! `TerminateProcess` on Windows). A process that is already gone is not
//! an error: [`TerminateOutcome::AlreadyExited`] is reported instead and
//! callers treat it as success.

use crate::check::process_exists;
use std::time::Duration;
use tracing::debug;
use watchdog_common::{ProcessError, ProcessResult};

/// Interval between existence checks while waiting for a killed process.
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of a termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// The process was alive and has been killed.
    Terminated,
    /// No such process; nothing to do.
    AlreadyExited,
}

/// Kill a process and wait until its PID disappears.
///
/// There is no internal timeout; wrap the future in
/// `tokio::time::timeout` to bound it.
pub async fn terminate_process(pid: u32) -> ProcessResult<TerminateOutcome> {
    let outcome = force_kill(pid)?;
    if outcome == TerminateOutcome::Terminated {
        wait_for_exit(pid).await?;
    }
    Ok(outcome)
}

/// Poll until the process no longer exists.
pub async fn wait_for_exit(pid: u32) -> ProcessResult<()> {
    loop {
        match process_exists(pid) {
            Ok(false) => {
                debug!("PID {} confirmed exited", pid);
                return Ok(());
            }
            Ok(true) => {}
            Err(e) => {
                return Err(ProcessError::terminate_failed(
                    pid,
                    format!("failed to confirm exit: {}", e),
                ))
            }
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
}

/// Force kill a process (SIGKILL on Unix, TerminateProcess on Windows).
pub fn force_kill(pid: u32) -> ProcessResult<TerminateOutcome> {
    if pid == 0 {
        return Ok(TerminateOutcome::AlreadyExited);
    }

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        // Values above i32::MAX would turn into a process-group target.
        let Ok(raw) = i32::try_from(pid) else {
            return Ok(TerminateOutcome::AlreadyExited);
        };

        match kill(Pid::from_raw(raw), Signal::SIGKILL) {
            Ok(()) => Ok(TerminateOutcome::Terminated),
            Err(nix::errno::Errno::ESRCH) => Ok(TerminateOutcome::AlreadyExited),
            Err(e) => Err(ProcessError::terminate_failed(pid, e.to_string())),
        }
    }

    #[cfg(windows)]
    {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        unsafe {
            let handle = match OpenProcess(PROCESS_TERMINATE, false, pid) {
                Ok(h) if !h.is_invalid() => h,
                _ => {
                    return match process_exists(pid) {
                        Ok(false) => Ok(TerminateOutcome::AlreadyExited),
                        _ => Err(ProcessError::terminate_failed(
                            pid,
                            "failed to open process for termination",
                        )),
                    };
                }
            };

            let result = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);

            result
                .map(|_| TerminateOutcome::Terminated)
                .map_err(|e| ProcessError::terminate_failed(pid, format!("TerminateProcess failed: {}", e)))
        }
    }
}
