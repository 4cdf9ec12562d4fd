//! Control API - the operations a controller may invoke.
//!
//! Each call holds the registry lock for its full duration, so it is
//! atomic with respect to other calls and to reconciliation ticks.

use crate::lifecycle::{StartOutcome, StopOutcome};
use crate::model::{ProcessCommand, ProcessStatusView, WatchedProcess};
use crate::registry::Registry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use watchdog_common::{ProcessError, ProcessResult};

/// Parameters of an add request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddProcessRequest {
    pub file_path: PathBuf,
    /// Display name; the file name is used when absent or blank.
    pub program_name: Option<String>,
    pub auto_restart: bool,
    pub restart_interval_seconds: u64,
    pub start_immediately: bool,
}

/// Settings carried alongside a command.
///
/// `auto_restart` and `restart_interval_seconds` are applied by Start.
/// `start_immediately` is accepted for wire compatibility and has no
/// effect on commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandOptions {
    pub auto_restart: bool,
    pub restart_interval_seconds: u64,
    pub start_immediately: bool,
}

/// Cloneable handle shared by the command server and the startup loader.
#[derive(Clone)]
pub struct ControlApi {
    registry: Arc<Registry>,
}

impl ControlApi {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Register an executable, launching it if requested.
    ///
    /// Fails for a rejected executable or an already registered path. A
    /// failed initial launch does not fail the add.
    pub async fn add_process(&self, request: AddProcessRequest) -> ProcessResult<()> {
        let entry = WatchedProcess::new(
            request.file_path,
            request.program_name,
            request.auto_restart,
            request.restart_interval_seconds,
            request.start_immediately,
        );

        self.registry.lock().await.add(entry).await
    }

    /// Apply a start/stop/delete command to a named program.
    ///
    /// Returns a human-readable result message. The program is looked up
    /// before the command code is checked, so an unknown name is reported
    /// even when the code is also invalid.
    pub async fn handle_command(
        &self,
        program_name: &str,
        command: i32,
        options: CommandOptions,
    ) -> ProcessResult<String> {
        let mut registry = self.registry.lock().await;

        if registry.find(program_name).is_none() {
            return Err(ProcessError::not_found(program_name));
        }
        let command = ProcessCommand::try_from(command)?;

        match command {
            ProcessCommand::Start => {
                if let Some(entry) = registry.find_mut(program_name) {
                    entry.manually_stopped = false;
                    entry.auto_restart = options.auto_restart;
                    entry.restart_interval_seconds = options.restart_interval_seconds;
                }

                let result = registry.start(program_name).await;
                registry.persist().await;

                match result? {
                    StartOutcome::Launched(pid) => Ok(format!("{} started (PID: {})", program_name, pid)),
                    StartOutcome::AlreadyRunning(pid) => {
                        Ok(format!("{} is already running (PID: {})", program_name, pid))
                    }
                }
            }
            ProcessCommand::Stop => {
                let outcome = registry.stop(program_name).await?;
                registry.persist().await;

                match outcome {
                    StopOutcome::Terminated(_) => Ok(format!("{} stopped", program_name)),
                    StopOutcome::AlreadyStopped => Ok(format!("{} already stopped", program_name)),
                }
            }
            ProcessCommand::Delete => {
                registry.remove(program_name).await?;
                registry.persist().await;
                Ok(format!("{} deleted", program_name))
            }
        }
    }

    /// Status views of every entry.
    pub async fn statuses(&self) -> Vec<ProcessStatusView> {
        self.registry.snapshot().await
    }

    /// Seed the registry from its file. Returns the number of records added.
    ///
    /// Observed state is reset; the next reconciliation tick discovers
    /// which executables are actually running.
    pub async fn load_persisted(&self) -> ProcessResult<usize> {
        let Some(store) = self.registry.store() else {
            return Ok(0);
        };

        let records: Vec<WatchedProcess> = store.load().await?;
        let total = records.len();

        let mut registry = self.registry.lock().await;
        let loaded = records
            .into_iter()
            .map(|record| registry.insert_loaded(record))
            .filter(|&inserted| inserted)
            .count();

        if loaded < total {
            warn!("Skipped {} duplicate records", total - loaded);
        }
        info!("Loaded {} programs from {}", loaded, store.path().display());
        Ok(loaded)
    }

    /// Rewrite the registry file now.
    pub async fn persist(&self) {
        self.registry.lock().await.persist().await;
    }
}
