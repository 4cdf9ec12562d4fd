//! # Watchdog Common
//!
//! Error types shared by every watchdog crate.

pub mod errors;

pub use errors::{ProcessError, ProcessResult};
