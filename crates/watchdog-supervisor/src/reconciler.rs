//! Reconciliation loop.
//!
//! Every tick takes a fresh OS process snapshot, updates the observed
//! status of every entry, and relaunches entries the auto-restart policy
//! allows. A whole tick runs under the registry lock.

use crate::lifecycle;
use crate::registry::Registry;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use watchdog_common::{ProcessError, ProcessResult};

/// What one tick observed and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Entries running at the end of the tick.
    pub running: usize,
    /// Entries stopped at the end of the tick.
    pub stopped: usize,
    /// Programs relaunched during the tick.
    pub restarted: Vec<String>,
    /// Programs whose relaunch failed.
    pub restart_failures: Vec<String>,
}

impl ReconcileReport {
    pub fn is_quiet(&self) -> bool {
        self.restarted.is_empty() && self.restart_failures.is_empty()
    }
}

pub struct Reconciler {
    registry: Arc<Registry>,
    period: Duration,
}

impl Reconciler {
    pub fn new(registry: Arc<Registry>, period: Duration) -> Self {
        Self { registry, period }
    }

    /// Run one reconciliation pass.
    ///
    /// A failed snapshot abandons the tick without touching any entry.
    pub async fn tick(&self) -> ProcessResult<ReconcileReport> {
        let registry = self.registry.as_ref();
        let timeouts = registry.timeouts();
        let mut guard = registry.lock().await;

        let table = match tokio::time::timeout(timeouts.snapshot, registry.platform().snapshot()).await {
            Ok(result) => result?,
            Err(_) => return Err(ProcessError::snapshot_failed("process snapshot timed out")),
        };

        let now = Utc::now();
        let mut report = ReconcileReport::default();

        for entry in guard.entries_mut() {
            if let Some(pid) = table.lookup(&entry.file_path) {
                if !entry.is_running() || entry.process_id != pid {
                    debug!("{} observed running (PID: {})", entry.program_name, pid);
                }
                entry.mark_running(pid);
                report.running += 1;
                continue;
            }

            if entry.is_running() {
                info!("{} (PID: {}) is no longer running", entry.program_name, entry.process_id);
            }
            entry.mark_stopped();

            if !entry.should_auto_restart(now) {
                report.stopped += 1;
                continue;
            }

            match lifecycle::launch_entry(registry.platform(), entry, timeouts.launch).await {
                Ok(_) => {
                    report.running += 1;
                    report.restarted.push(entry.program_name.clone());
                }
                Err(e) => {
                    warn!("Auto-restart of {} failed: {}", entry.program_name, e);
                    report.stopped += 1;
                    report.restart_failures.push(entry.program_name.clone());
                }
            }
        }

        Ok(report)
    }

    /// Tick every period until `shutdown` is cancelled.
    ///
    /// Cancellation is checked between ticks; a tick in progress runs to
    /// completion.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Reconciler started (interval: {:?})", self.period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick().await {
                Ok(report) if report.is_quiet() => {
                    debug!("Reconcile: {} running, {} stopped", report.running, report.stopped);
                }
                Ok(report) => {
                    info!(
                        "Reconcile: {} running, {} stopped, restarted {:?}, failed {:?}",
                        report.running, report.stopped, report.restarted, report.restart_failures
                    );
                }
                Err(e) => warn!("Reconcile tick abandoned: {}", e),
            }
        }

        info!("Reconciler stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{AddProcessRequest, CommandOptions, ControlApi};
    use crate::lifecycle::OperationTimeouts;
    use crate::testing::FakePlatform;
    use std::path::PathBuf;

    struct Fixture {
        platform: Arc<FakePlatform>,
        api: ControlApi,
        reconciler: Reconciler,
    }

    fn fixture() -> Fixture {
        let platform = Arc::new(FakePlatform::new());
        let registry = Arc::new(Registry::new(platform.clone()));
        Fixture {
            platform,
            api: ControlApi::new(registry.clone()),
            reconciler: Reconciler::new(registry, Duration::from_millis(20)),
        }
    }

    fn request(path: &str, interval: u64, start: bool) -> AddProcessRequest {
        AddProcessRequest {
            file_path: PathBuf::from(path),
            program_name: Some("X".to_string()),
            auto_restart: true,
            restart_interval_seconds: interval,
            start_immediately: start,
        }
    }

    fn start_options(interval: u64) -> CommandOptions {
        CommandOptions {
            auto_restart: true,
            restart_interval_seconds: interval,
            start_immediately: false,
        }
    }

    #[tokio::test]
    async fn test_observes_external_process() {
        let f = fixture();
        f.api.add_process(request("/bin/x", 0, false)).await.unwrap();
        let pid = f.platform.start_externally("/BIN/X");

        let report = f.reconciler.tick().await.unwrap();
        assert_eq!(report.running, 1);

        let guard = f.api.registry().lock().await;
        let entry = guard.find("X").unwrap();
        assert!(entry.is_running());
        assert_eq!(entry.process_id, pid);
    }

    #[tokio::test]
    async fn test_restarts_crashed_process() {
        let f = fixture();
        f.api.add_process(request("/bin/x", 0, true)).await.unwrap();
        f.platform.kill_externally("/bin/x");

        let report = f.reconciler.tick().await.unwrap();
        assert_eq!(report.restarted, vec!["X".to_string()]);
        assert!(f.platform.is_running("/bin/x"));
        assert_eq!(f.platform.launch_count("/bin/x"), 2);
    }

    #[tokio::test]
    async fn test_manual_stop_blocks_restart() {
        let f = fixture();
        f.api.add_process(request("/bin/x", 0, true)).await.unwrap();
        f.api.handle_command("X", 2, CommandOptions::default()).await.unwrap();

        let report = f.reconciler.tick().await.unwrap();
        assert!(report.restarted.is_empty());
        assert_eq!(report.stopped, 1);
        assert!(!f.platform.is_running("/bin/x"));
        assert_eq!(f.platform.launch_count("/bin/x"), 1);
    }

    #[tokio::test]
    async fn test_start_after_manual_stop_reenables_restart() {
        let f = fixture();
        f.api.add_process(request("/bin/x", 0, true)).await.unwrap();
        f.api.handle_command("X", 2, CommandOptions::default()).await.unwrap();
        f.api.handle_command("X", 1, start_options(0)).await.unwrap();

        f.platform.kill_externally("/bin/x");
        let report = f.reconciler.tick().await.unwrap();
        assert_eq!(report.restarted, vec!["X".to_string()]);
        assert_eq!(f.platform.launch_count("/bin/x"), 3);
    }

    #[tokio::test]
    async fn test_cooldown_delays_restart() {
        let f = fixture();
        f.api.add_process(request("/bin/x", 3600, true)).await.unwrap();
        f.platform.kill_externally("/bin/x");

        let report = f.reconciler.tick().await.unwrap();
        assert!(report.restarted.is_empty());
        assert_eq!(report.stopped, 1);

        let guard = f.api.registry().lock().await;
        let entry = guard.find("X").unwrap();
        assert!(!entry.is_running());
        assert_eq!(entry.process_id, 0);
    }

    #[tokio::test]
    async fn test_cooldown_counts_from_manual_start() {
        let f = fixture();
        f.api.add_process(request("/bin/x", 3600, false)).await.unwrap();
        f.api.handle_command("X", 1, start_options(3600)).await.unwrap();
        f.platform.kill_externally("/bin/x");

        // Cooldown is measured from the last launch, which just happened.
        let report = f.reconciler.tick().await.unwrap();
        assert!(report.restarted.is_empty());
    }

    #[tokio::test]
    async fn test_tick_is_idempotent() {
        let f = fixture();
        f.api.add_process(request("/bin/x", 0, true)).await.unwrap();
        f.platform.kill_externally("/bin/x");

        f.reconciler.tick().await.unwrap();
        let after_first = f.api.statuses().await;
        let launches = f.platform.total_launches();

        let second = f.reconciler.tick().await.unwrap();
        assert!(second.is_quiet());
        assert_eq!(f.api.statuses().await, after_first);
        assert_eq!(f.platform.total_launches(), launches);
    }

    #[tokio::test]
    async fn test_snapshot_failure_abandons_tick() {
        let f = fixture();
        f.api.add_process(request("/bin/x", 0, true)).await.unwrap();
        f.platform.kill_externally("/bin/x");
        f.platform.fail_snapshots(true);

        let err = f.reconciler.tick().await.unwrap_err();
        assert!(matches!(err, ProcessError::SnapshotFailed { .. }));

        let statuses = f.api.statuses().await;
        assert!(statuses[0].is_running);
        assert_eq!(f.platform.launch_count("/bin/x"), 1);
    }

    #[tokio::test]
    async fn test_slow_snapshot_is_bounded_by_snapshot_timeout() {
        let platform = Arc::new(FakePlatform::new());
        let registry = Arc::new(Registry::new(platform.clone()).with_timeouts(OperationTimeouts {
            launch: Duration::from_secs(30),
            terminate: Duration::from_secs(30),
            snapshot: Duration::from_millis(20),
        }));
        let api = ControlApi::new(registry.clone());
        let reconciler = Reconciler::new(registry, Duration::from_millis(20));
        api.add_process(request("/bin/x", 0, false)).await.unwrap();
        platform.set_snapshot_delay(Duration::from_millis(500));

        let err = tokio::time::timeout(Duration::from_millis(250), reconciler.tick())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ProcessError::SnapshotFailed { .. }));
    }

    #[tokio::test]
    async fn test_failed_restart_is_reported() {
        let f = fixture();
        f.api.add_process(request("/bin/x", 0, true)).await.unwrap();
        f.platform.kill_externally("/bin/x");
        f.platform.fail_launches("/bin/x", true);

        let report = f.reconciler.tick().await.unwrap();
        assert_eq!(report.restart_failures, vec!["X".to_string()]);
        assert!(!f.api.statuses().await[0].is_running);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let f = fixture();
        f.api.add_process(request("/bin/x", 0, true)).await.unwrap();
        f.platform.kill_externally("/bin/x");

        let shutdown = CancellationToken::new();
        let handle = f.reconciler.spawn(shutdown.clone());

        tokio::time::timeout(Duration::from_secs(5), async {
            while !f.platform.is_running("/bin/x") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
