//! # Watchdog Supervisor
//!
//! Process supervision core for the watchdog.
//!
//! This crate provides:
//! - Registry - the single lock-protected table of watched executables
//! - ControlApi - add / start / stop / delete / status operations
//! - Reconciler - periodic observe-and-restart loop
//! - Configuration loading and validation
//!
//! The OS is reached only through [`watchdog_process::ProcessPlatform`];
//! enable the `test-util` feature for an in-memory implementation.

pub mod config;
pub mod control;
pub mod lifecycle;
pub mod model;
pub mod reconciler;
pub mod registry;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::{ServerConfig, SupervisorConfig, WatchdogConfig};
pub use control::{AddProcessRequest, CommandOptions, ControlApi};
pub use lifecycle::{OperationTimeouts, StartOutcome, StopOutcome};
pub use model::{ProcessCommand, ProcessStatus, ProcessStatusView, WatchedProcess};
pub use reconciler::{ReconcileReport, Reconciler};
pub use registry::{Registry, RegistryGuard};
