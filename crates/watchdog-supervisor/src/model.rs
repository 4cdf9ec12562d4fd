//! Registry data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use watchdog_common::ProcessError;

/// Last observed state of a watched executable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    Running,
    #[default]
    Stopped,
}

/// One supervised executable and its desired/observed state.
///
/// This is also the persisted record; field names on disk are camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedProcess {
    pub file_path: PathBuf,
    pub program_name: String,
    pub auto_restart: bool,
    pub restart_interval_seconds: u64,
    pub start_immediately: bool,

    /// Set by an explicit stop; suppresses auto-restart until an explicit start.
    #[serde(default)]
    pub manually_stopped: bool,

    /// PID of the believed-running instance, 0 when stopped.
    #[serde(default)]
    pub process_id: u32,

    #[serde(default)]
    pub status: ProcessStatus,

    /// Time of the last successful launch; `None` if never started.
    #[serde(default)]
    pub last_start_time: Option<DateTime<Utc>>,
}

impl WatchedProcess {
    /// Build a fresh entry. The program name defaults to the file name.
    pub fn new(
        file_path: impl Into<PathBuf>,
        program_name: Option<String>,
        auto_restart: bool,
        restart_interval_seconds: u64,
        start_immediately: bool,
    ) -> Self {
        let file_path = file_path.into();
        let program_name = program_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| default_program_name(&file_path));

        Self {
            file_path,
            program_name,
            auto_restart,
            restart_interval_seconds,
            start_immediately,
            manually_stopped: !start_immediately,
            process_id: 0,
            status: ProcessStatus::Stopped,
            last_start_time: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ProcessStatus::Running
    }

    pub fn ever_started(&self) -> bool {
        self.last_start_time.is_some()
    }

    pub fn mark_running(&mut self, pid: u32) {
        self.status = ProcessStatus::Running;
        self.process_id = pid;
    }

    /// Stopped entries never carry a PID.
    pub fn mark_stopped(&mut self) {
        self.status = ProcessStatus::Stopped;
        self.process_id = 0;
    }

    /// Record a successful launch at `now`.
    pub fn mark_started(&mut self, pid: u32, now: DateTime<Utc>) {
        self.mark_running(pid);
        self.last_start_time = Some(now);
    }

    /// Reset observed state after loading from disk.
    pub fn reset_observed(&mut self) {
        self.mark_stopped();
    }

    /// Whether the restart cooldown, measured from the last launch, has elapsed.
    pub fn cooldown_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.last_start_time {
            None => true,
            Some(started) => (now - started)
                .to_std()
                .map(|elapsed| elapsed >= Duration::from_secs(self.restart_interval_seconds))
                .unwrap_or(false),
        }
    }

    /// Auto-restart policy for an entry observed stopped.
    pub fn should_auto_restart(&self, now: DateTime<Utc>) -> bool {
        !self.manually_stopped && self.auto_restart && self.cooldown_elapsed(now)
    }

    pub fn status_view(&self) -> ProcessStatusView {
        let is_running = self.is_running();
        ProcessStatusView {
            program_name: self.program_name.clone(),
            is_running,
            command: if is_running { 1 } else { 0 },
            auto_restart: self.auto_restart,
            restart_interval: self.restart_interval_seconds,
            start_immediately: self.start_immediately,
            manually_stopped: self.manually_stopped,
            ever_started: self.ever_started(),
        }
    }
}

/// File name of `path`, or the whole path when it has none.
pub fn default_program_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read-only projection of an entry, as sent on the status feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStatusView {
    pub program_name: String,
    pub is_running: bool,
    /// 1 while running, 0 otherwise.
    pub command: i32,
    pub auto_restart: bool,
    pub restart_interval: u64,
    pub start_immediately: bool,
    pub manually_stopped: bool,
    pub ever_started: bool,
}

/// Commands accepted by [`crate::ControlApi::handle_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessCommand {
    Start = 1,
    Stop = 2,
    Delete = 3,
}

impl TryFrom<i32> for ProcessCommand {
    type Error = ProcessError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Start),
            2 => Ok(Self::Stop),
            3 => Ok(Self::Delete),
            other => Err(ProcessError::unknown_command(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> WatchedProcess {
        WatchedProcess::new("/opt/app/server", None, true, 5, false)
    }

    #[test]
    fn test_defaults() {
        let e = entry();
        assert_eq!(e.program_name, "server");
        assert_eq!(e.status, ProcessStatus::Stopped);
        assert_eq!(e.process_id, 0);
        assert!(e.manually_stopped);
        assert!(!e.ever_started());

        let named = WatchedProcess::new("/opt/app/server", Some("api".to_string()), true, 5, true);
        assert_eq!(named.program_name, "api");
        assert!(!named.manually_stopped);

        let blank = WatchedProcess::new("/opt/app/server", Some("  ".to_string()), true, 5, true);
        assert_eq!(blank.program_name, "server");
    }

    #[test]
    fn test_stopped_clears_pid() {
        let mut e = entry();
        e.mark_started(4242, Utc::now());
        assert!(e.is_running());
        assert_eq!(e.process_id, 4242);

        e.mark_stopped();
        assert_eq!(e.process_id, 0);
        assert!(e.ever_started());
    }

    #[test]
    fn test_cooldown_measured_from_last_start() {
        let now = Utc::now();
        let mut e = entry();
        e.manually_stopped = false;
        assert!(e.should_auto_restart(now));

        e.last_start_time = Some(now - chrono::Duration::seconds(3));
        assert!(!e.should_auto_restart(now));

        e.last_start_time = Some(now - chrono::Duration::seconds(5));
        assert!(e.should_auto_restart(now));

        e.manually_stopped = true;
        assert!(!e.should_auto_restart(now));

        e.manually_stopped = false;
        e.auto_restart = false;
        assert!(!e.should_auto_restart(now));
    }

    #[test]
    fn test_status_view() {
        let mut e = entry();
        let view = e.status_view();
        assert!(!view.is_running);
        assert_eq!(view.command, 0);

        e.mark_started(7, Utc::now());
        let view = e.status_view();
        assert!(view.is_running);
        assert_eq!(view.command, 1);
        assert!(view.ever_started);
        assert_eq!(view.restart_interval, 5);
    }

    #[test]
    fn test_command_codes() {
        assert_eq!(ProcessCommand::try_from(1).unwrap(), ProcessCommand::Start);
        assert_eq!(ProcessCommand::try_from(2).unwrap(), ProcessCommand::Stop);
        assert_eq!(ProcessCommand::try_from(3).unwrap(), ProcessCommand::Delete);
        assert!(ProcessCommand::try_from(9).unwrap_err().is_validation());
    }

    #[test]
    fn test_record_field_names() {
        let json = serde_json::to_value(entry()).unwrap();
        for key in [
            "filePath",
            "programName",
            "autoRestart",
            "restartIntervalSeconds",
            "startImmediately",
            "manuallyStopped",
            "processId",
            "status",
            "lastStartTime",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert!(json["lastStartTime"].is_null());
        assert_eq!(json["status"], "Stopped");
    }
}
