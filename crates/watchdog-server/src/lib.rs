//! # Watchdog Server
//!
//! TCP command server for the watchdog.
//!
//! Controllers connect over TCP and exchange newline-delimited JSON:
//! - `1001` toggles the periodic status feed for the connection
//! - `1002` starts (1), stops (2) or deletes (3) a named program
//! - `1003` registers a new program
//!
//! Each connection is served by its own task; all of them share one
//! [`watchdog_supervisor::ControlApi`].

pub mod error;
pub mod protocol;
pub mod server;
mod session;

pub use error::{ServerError, ServerResult};
pub use protocol::{ClientRequest, ResponseStatus, ServerResponse};
pub use server::CommandServer;
