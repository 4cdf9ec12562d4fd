//! # Watchdog Process
//!
//! Low-level process operations used by the supervisor:
//! - Live process inspection (executable path to PID)
//! - Launching an executable detached from the watchdog
//! - Forcible termination with exit confirmation
//! - Executable validation
//! - Process existence checks
//!
//! The supervisor only talks to these through the [`ProcessPlatform`]
//! trait, so tests can swap in an in-memory process table.

pub mod check;
pub mod execute;
pub mod inspect;
pub mod platform;
pub mod terminate;
pub mod validation;

pub use check::process_exists;
pub use execute::launch_executable;
pub use inspect::{path_key, ProcessTable, SystemInspector};
pub use platform::{ProcessPlatform, SystemPlatform};
pub use terminate::{force_kill, terminate_process, wait_for_exit, TerminateOutcome};
pub use validation::validate_executable;
