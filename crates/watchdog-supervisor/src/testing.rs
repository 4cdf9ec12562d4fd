//! In-memory process platform for tests.
//!
//! `FakePlatform` keeps a table of "running" executables. Launching adds
//! an entry, terminating removes it, and tests can simulate crashes or
//! OS failures without spawning real processes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use watchdog_common::{ProcessError, ProcessResult};
use watchdog_process::{path_key, ProcessPlatform, ProcessTable, TerminateOutcome};

const FIRST_PID: u32 = 1000;

#[derive(Default)]
struct FakeState {
    running: ProcessTable,
    next_pid: u32,
    launches: HashMap<String, usize>,
    terminations: usize,
    rejected: HashSet<String>,
    failing_launches: HashSet<String>,
    fail_snapshots: bool,
    fail_terminations: bool,
    launch_delay: Option<Duration>,
    snapshot_delay: Option<Duration>,
}

impl FakeState {
    fn allocate_pid(&mut self) -> u32 {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }
}

/// Fake OS process table.
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_pid: FIRST_PID,
                ..FakeState::default()
            }),
        }
    }

    /// Simulate a process started outside the watchdog.
    pub fn start_externally(&self, path: impl AsRef<Path>) -> u32 {
        let mut state = self.state.lock();
        let pid = state.allocate_pid();
        state.running.insert(path, pid);
        pid
    }

    /// Simulate a crash: the process disappears without the watchdog asking.
    pub fn kill_externally(&self, path: impl AsRef<Path>) -> Option<u32> {
        self.state.lock().running.remove(path)
    }

    pub fn is_running(&self, path: impl AsRef<Path>) -> bool {
        self.pid_of(path).is_some()
    }

    pub fn pid_of(&self, path: impl AsRef<Path>) -> Option<u32> {
        self.state.lock().running.lookup(path)
    }

    /// Successful launches of `path`.
    pub fn launch_count(&self, path: impl AsRef<Path>) -> usize {
        let state = self.state.lock();
        state.launches.get(&path_key(path)).copied().unwrap_or(0)
    }

    pub fn total_launches(&self) -> usize {
        self.state.lock().launches.values().sum()
    }

    /// Terminations of live processes.
    pub fn terminate_count(&self) -> usize {
        self.state.lock().terminations
    }

    /// Make validation reject `path`.
    pub fn reject_executable(&self, path: impl AsRef<Path>) {
        self.state.lock().rejected.insert(path_key(path));
    }

    pub fn fail_launches(&self, path: impl AsRef<Path>, fail: bool) {
        let key = path_key(path);
        let mut state = self.state.lock();
        if fail {
            state.failing_launches.insert(key);
        } else {
            state.failing_launches.remove(&key);
        }
    }

    pub fn fail_snapshots(&self, fail: bool) {
        self.state.lock().fail_snapshots = fail;
    }

    pub fn fail_terminations(&self, fail: bool) {
        self.state.lock().fail_terminations = fail;
    }

    /// Delay every launch, to exercise timeouts.
    pub fn set_launch_delay(&self, delay: Duration) {
        self.state.lock().launch_delay = Some(delay);
    }

    pub fn set_snapshot_delay(&self, delay: Duration) {
        self.state.lock().snapshot_delay = Some(delay);
    }
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessPlatform for FakePlatform {
    fn validate_executable(&self, path: &Path) -> ProcessResult<()> {
        if path.as_os_str().is_empty() {
            return Err(ProcessError::invalid_executable("", "path cannot be empty"));
        }
        if self.state.lock().rejected.contains(&path_key(path)) {
            return Err(ProcessError::invalid_executable(
                path.display().to_string(),
                "rejected by test platform",
            ));
        }
        Ok(())
    }

    async fn snapshot(&self) -> ProcessResult<ProcessTable> {
        let delay = self.state.lock().snapshot_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock();
        if state.fail_snapshots {
            return Err(ProcessError::snapshot_failed("simulated inspector failure"));
        }
        Ok(state.running.clone())
    }

    async fn launch(&self, path: &Path) -> ProcessResult<u32> {
        let delay = self.state.lock().launch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        let key = path_key(path);
        if state.failing_launches.contains(&key) {
            return Err(ProcessError::launch_failed(
                path.display().to_string(),
                "simulated launch failure",
            ));
        }

        let pid = state.allocate_pid();
        state.running.insert(path, pid);
        *state.launches.entry(key).or_insert(0) += 1;
        Ok(pid)
    }

    async fn terminate(&self, pid: u32) -> ProcessResult<TerminateOutcome> {
        let mut state = self.state.lock();
        if state.fail_terminations {
            return Err(ProcessError::terminate_failed(pid, "simulated terminate failure"));
        }

        let Some(path) = state.running.path_of(pid).map(str::to_owned) else {
            return Ok(TerminateOutcome::AlreadyExited);
        };
        state.running.remove(&path);
        state.terminations += 1;
        Ok(TerminateOutcome::Terminated)
    }
}
