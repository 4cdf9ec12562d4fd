//! The registry of watched processes.
//!
//! One mutex guards the whole table. Callers take the lock with
//! [`Registry::lock`] and perform a complete operation (validate, mutate,
//! persist, or a full reconciliation pass) through the returned
//! [`RegistryGuard`] before releasing it.

use crate::lifecycle::{self, OperationTimeouts, StartOutcome, StopOutcome};
use crate::model::{ProcessStatusView, WatchedProcess};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use watchdog_common::{ProcessError, ProcessResult};
use watchdog_process::{path_key, ProcessPlatform};
use watchdog_process_file::RegistryFile;

pub struct Registry {
    entries: Mutex<Vec<WatchedProcess>>,
    platform: Arc<dyn ProcessPlatform>,
    store: Option<RegistryFile>,
    timeouts: OperationTimeouts,
}

impl Registry {
    /// Create an empty, in-memory registry.
    pub fn new(platform: Arc<dyn ProcessPlatform>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            platform,
            store: None,
            timeouts: OperationTimeouts::default(),
        }
    }

    /// Persist every mutation to `store`.
    pub fn with_store(mut self, store: RegistryFile) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_timeouts(mut self, timeouts: OperationTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn platform(&self) -> &dyn ProcessPlatform {
        self.platform.as_ref()
    }

    pub fn store(&self) -> Option<&RegistryFile> {
        self.store.as_ref()
    }

    pub fn timeouts(&self) -> OperationTimeouts {
        self.timeouts
    }

    /// Acquire exclusive access for one logical operation.
    pub async fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            registry: self,
            entries: self.entries.lock().await,
        }
    }

    /// Status views of every entry, in insertion order.
    pub async fn snapshot(&self) -> Vec<ProcessStatusView> {
        self.lock().await.views()
    }
}

/// Exclusive access to the registry contents.
pub struct RegistryGuard<'a> {
    registry: &'a Registry,
    entries: MutexGuard<'a, Vec<WatchedProcess>>,
}

impl<'a> RegistryGuard<'a> {
    pub fn entries(&self) -> &[WatchedProcess] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [WatchedProcess] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive path membership.
    pub fn contains_path(&self, path: &Path) -> bool {
        let key = path_key(path);
        self.entries.iter().any(|e| path_key(&e.file_path) == key)
    }

    /// Exact, case-sensitive lookup by program name.
    pub fn find(&self, program_name: &str) -> Option<&WatchedProcess> {
        self.entries.iter().find(|e| e.program_name == program_name)
    }

    pub fn find_mut(&mut self, program_name: &str) -> Option<&mut WatchedProcess> {
        self.entries.iter_mut().find(|e| e.program_name == program_name)
    }

    pub fn views(&self) -> Vec<ProcessStatusView> {
        self.entries.iter().map(WatchedProcess::status_view).collect()
    }

    /// Register a new entry.
    ///
    /// Fails without mutation when the executable is rejected or its path
    /// is already registered. The entry is inserted as stopped, persisted,
    /// and launched if `start_immediately` is set. A failed launch is
    /// logged; the entry is kept.
    pub async fn add(&mut self, mut entry: WatchedProcess) -> ProcessResult<()> {
        let registry = self.registry;
        registry.platform().validate_executable(&entry.file_path)?;

        if self.contains_path(&entry.file_path) {
            return Err(ProcessError::already_exists(entry.file_path.display().to_string()));
        }

        entry.reset_observed();
        entry.last_start_time = None;
        let start = entry.start_immediately;
        let name = entry.program_name.clone();

        info!("Registered {} ({})", name, entry.file_path.display());
        self.entries.push(entry);
        self.persist().await;

        if start {
            let result = match self.entries.last_mut() {
                Some(entry) => {
                    lifecycle::start_entry(registry.platform(), entry, registry.timeouts.launch).await
                }
                None => Err(ProcessError::not_found(&name)),
            };
            if let Err(e) = result {
                warn!("Initial start of {} failed: {}", name, e);
            }
            self.persist().await;
        }

        Ok(())
    }

    /// Insert a record loaded from disk. Returns false for a duplicate path.
    pub fn insert_loaded(&mut self, mut entry: WatchedProcess) -> bool {
        if self.contains_path(&entry.file_path) {
            warn!(
                "Skipping duplicate registry record {} ({})",
                entry.program_name,
                entry.file_path.display()
            );
            return false;
        }
        entry.reset_observed();
        self.entries.push(entry);
        true
    }

    /// Start the named entry. Does not touch its settings.
    pub async fn start(&mut self, program_name: &str) -> ProcessResult<StartOutcome> {
        let registry = self.registry;
        let entry = self
            .find_mut(program_name)
            .ok_or_else(|| ProcessError::not_found(program_name))?;
        lifecycle::start_entry(registry.platform(), entry, registry.timeouts.launch).await
    }

    /// Stop the named entry and mark it manually stopped.
    ///
    /// If termination fails the entry is left as it was.
    pub async fn stop(&mut self, program_name: &str) -> ProcessResult<StopOutcome> {
        let registry = self.registry;
        let entry = self
            .find_mut(program_name)
            .ok_or_else(|| ProcessError::not_found(program_name))?;
        let outcome =
            lifecycle::stop_entry(registry.platform(), entry, registry.timeouts.terminate).await?;
        entry.manually_stopped = true;
        Ok(outcome)
    }

    /// Stop (best effort) and remove the named entry.
    pub async fn remove(&mut self, program_name: &str) -> ProcessResult<WatchedProcess> {
        let registry = self.registry;
        let index = self
            .entries
            .iter()
            .position(|e| e.program_name == program_name)
            .ok_or_else(|| ProcessError::not_found(program_name))?;

        if let Err(e) = lifecycle::stop_entry(
            registry.platform(),
            &mut self.entries[index],
            registry.timeouts.terminate,
        )
        .await
        {
            warn!("Stop before removing {} failed: {}", program_name, e);
        }

        let removed = self.entries.remove(index);
        info!("Removed {} ({})", removed.program_name, removed.file_path.display());
        Ok(removed)
    }

    /// Rewrite the registry file. Failures are logged only.
    pub async fn persist(&self) {
        let Some(store) = self.registry.store() else {
            return;
        };

        match store.save(self.entries.as_slice()).await {
            Ok(()) => debug!("Persisted {} entries", self.entries.len()),
            Err(e) => error!("Failed to persist registry: {}", e),
        }
    }
}
