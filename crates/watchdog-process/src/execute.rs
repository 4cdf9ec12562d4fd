//! Process launching.

use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use watchdog_common::{ProcessError, ProcessResult};

/// Launch an executable with no arguments and return its PID.
///
/// The working directory is the executable's containing directory. Stdio
/// is detached since the watchdog does not capture output. A background
/// task owns the child handle and waits on it so the exited process is
/// reaped.
///
/// Must be called from within a Tokio runtime.
pub fn launch_executable(path: &Path) -> ProcessResult<u32> {
    let exe = path.display().to_string();

    let mut cmd = Command::new(path);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        cmd.current_dir(dir);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    // Keep console control events of the watchdog away from the child.
    #[cfg(windows)]
    {
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }

    let child = cmd
        .spawn()
        .map_err(|e| ProcessError::launch_failed(&exe, e.to_string()))?;

    let pid = child
        .id()
        .ok_or_else(|| ProcessError::launch_failed(&exe, "process exited before its PID was read"))?;

    info!("Launched {} (PID: {})", exe, pid);
    tokio::spawn(reap(child, pid, exe));

    Ok(pid)
}

async fn reap(mut child: Child, pid: u32, exe: String) {
    match child.wait().await {
        Ok(status) => info!("{} (PID: {}) exited: {}", exe, pid, status),
        Err(e) => warn!("Failed to wait on {} (PID: {}): {}", exe, pid, e),
    }
    debug!("Reaper finished for PID {}", pid);
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[tokio::test]
    async fn test_launch_missing_executable_fails() {
        let err = launch_executable(Path::new("/nonexistent/watchdog-test-binary")).unwrap_err();
        assert!(matches!(err, ProcessError::LaunchFailed { .. }));
    }

    #[tokio::test]
    async fn test_launch_returns_pid() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("quick.sh");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let pid = launch_executable(&script).unwrap();
        assert!(pid > 0);
    }
}
