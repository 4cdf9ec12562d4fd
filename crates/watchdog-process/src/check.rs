//! Process existence checking.

use watchdog_common::{ProcessError, ProcessResult};

/// Check if a process with the given PID exists.
///
/// On Unix this is `kill(pid, 0)`, which sends nothing but reports whether
/// the PID is taken. On Windows the process is opened and its exit code is
/// compared against `STILL_ACTIVE`.
///
/// PID 0 is the "no process" sentinel and never exists.
///
/// # Returns
///
/// * `Ok(true)` - Process exists
/// * `Ok(false)` - Process does not exist
/// * `Err(_)` - The check itself failed
pub fn process_exists(pid: u32) -> ProcessResult<bool> {
    if pid == 0 {
        return Ok(false);
    }

    #[cfg(unix)]
    {
        process_exists_unix(pid)
    }

    #[cfg(windows)]
    {
        process_exists_windows(pid)
    }
}

#[cfg(unix)]
fn process_exists_unix(pid: u32) -> ProcessResult<bool> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Values above i32::MAX would turn into a process-group target.
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };

    match kill(Pid::from_raw(raw), None) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        // Exists, owned by someone else.
        Err(nix::errno::Errno::EPERM) => Ok(true),
        Err(e) => Err(ProcessError::snapshot_failed(format!(
            "failed to check PID {}: {}",
            pid, e
        ))),
    }
}

#[cfg(windows)]
fn process_exists_windows(pid: u32) -> ProcessResult<bool> {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{
        GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
    };

    const STILL_ACTIVE: u32 = 259;
    const ERROR_INVALID_PARAMETER: u32 = 0x80070057;
    const ERROR_ACCESS_DENIED: u32 = 0x80070005;

    unsafe {
        let handle = match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
            Ok(h) => h,
            Err(e) => {
                let code = e.code().0 as u32;
                if code == ERROR_INVALID_PARAMETER {
                    return Ok(false);
                }
                if code == ERROR_ACCESS_DENIED {
                    return Ok(true);
                }
                return Err(ProcessError::snapshot_failed(format!(
                    "failed to check PID {}: {}",
                    pid, e
                )));
            }
        };

        let mut exit_code: u32 = 0;
        let result = GetExitCodeProcess(handle, &mut exit_code);
        let _ = CloseHandle(handle);

        match result {
            Ok(()) => Ok(exit_code == STILL_ACTIVE),
            Err(e) => Err(ProcessError::snapshot_failed(format!(
                "failed to read exit code of PID {}: {}",
                pid, e
            ))),
        }
    }
}
