//! Wire format.
//!
//! Every message is one UTF-8 JSON object terminated by `\n`. Requests use
//! the controller's field names; responses use PascalCase keys.

use crate::error::{ServerError, ServerResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use watchdog_supervisor::{AddProcessRequest, CommandOptions, ProcessStatusView};

/// Subscribe to (or unsubscribe from) the periodic status feed.
pub const OP_STATUS_FEED: i32 = 1001;
/// Start / stop / delete a named program.
pub const OP_COMMAND: i32 = 1002;
/// Register a new program.
pub const OP_ADD_PROCESS: i32 = 1003;

/// Longest request line a connection may send, excluding the newline.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// A controller request. Only the fields relevant to the opcode are read;
/// missing fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRequest {
    #[serde(default)]
    pub opcode: i32,
    #[serde(default)]
    pub program_name: Option<String>,
    #[serde(default, rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(default, rename = "autoRestart")]
    pub auto_restart: bool,
    #[serde(default, rename = "restartInterval")]
    pub restart_interval: i64,
    #[serde(default)]
    pub start_immediately: bool,
    #[serde(default)]
    pub send: bool,
    #[serde(default)]
    pub command: i32,
}

impl ClientRequest {
    pub fn parse(line: &str) -> ServerResult<Self> {
        serde_json::from_str(line).map_err(|e| ServerError::Protocol(e.to_string()))
    }

    /// Negative intervals are treated as zero.
    pub fn restart_interval_seconds(&self) -> u64 {
        u64::try_from(self.restart_interval).unwrap_or(0)
    }

    pub fn command_options(&self) -> CommandOptions {
        CommandOptions {
            auto_restart: self.auto_restart,
            restart_interval_seconds: self.restart_interval_seconds(),
            start_immediately: self.start_immediately,
        }
    }

    pub fn add_request(&self) -> AddProcessRequest {
        AddProcessRequest {
            file_path: PathBuf::from(self.file_path.clone().unwrap_or_default()),
            program_name: self.program_name.clone(),
            auto_restart: self.auto_restart,
            restart_interval_seconds: self.restart_interval_seconds(),
            start_immediately: self.start_immediately,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Failure,
}

/// A server response or status push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerResponse {
    pub status: ResponseStatus,
    pub message: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl ServerResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failure,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn unknown_command() -> Self {
        Self::failure("unknown command")
    }

    /// Status feed push.
    pub fn statuses(views: &[ProcessStatusView]) -> ServerResult<Self> {
        let data = serde_json::to_value(views).map_err(ServerError::Encode)?;
        Ok(Self {
            status: ResponseStatus::Success,
            message: None,
            data: Some(data),
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// Serialize as one newline-terminated line.
    pub fn to_line(&self) -> ServerResult<String> {
        let mut line = serde_json::to_string(self).map_err(ServerError::Encode)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add_request() {
        let line = r#"{"opcode":1003,"program_name":"api","filePath":"/opt/api/server","autoRestart":true,"restartInterval":15,"start_immediately":true}"#;
        let request = ClientRequest::parse(line).unwrap();
        assert_eq!(request.opcode, OP_ADD_PROCESS);

        let add = request.add_request();
        assert_eq!(add.file_path, PathBuf::from("/opt/api/server"));
        assert_eq!(add.program_name.as_deref(), Some("api"));
        assert!(add.auto_restart);
        assert_eq!(add.restart_interval_seconds, 15);
        assert!(add.start_immediately);
    }

    #[test]
    fn test_missing_fields_default() {
        let request = ClientRequest::parse(r#"{"opcode":1001}"#).unwrap();
        assert!(!request.send);
        assert_eq!(request.command, 0);
        assert!(request.program_name.is_none());

        let request = ClientRequest::parse("{}").unwrap();
        assert_eq!(request.opcode, 0);
    }

    #[test]
    fn test_negative_interval_clamped() {
        let request = ClientRequest::parse(r#"{"opcode":1002,"restartInterval":-3}"#).unwrap();
        assert_eq!(request.restart_interval_seconds(), 0);
    }

    #[test]
    fn test_malformed_request() {
        assert!(matches!(ClientRequest::parse("{oops"), Err(ServerError::Protocol(_))));
        assert!(matches!(
            ClientRequest::parse(r#"{"opcode":"fast"}"#),
            Err(ServerError::Protocol(_))
        ));
    }

    #[test]
    fn test_response_shape() {
        let line = ServerResponse::unknown_command().to_line().unwrap();
        assert!(line.ends_with('\n'));

        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["Status"], "failure");
        assert_eq!(value["Message"], "unknown command");
        assert!(value["Data"].is_null());
    }

    #[test]
    fn test_status_push_shape() {
        let view = ProcessStatusView {
            program_name: "api".to_string(),
            is_running: true,
            command: 1,
            auto_restart: true,
            restart_interval: 10,
            start_immediately: false,
            manually_stopped: false,
            ever_started: true,
        };
        let response = ServerResponse::statuses(&[view]).unwrap();
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["Status"], "success");
        assert!(value["Message"].is_null());
        assert_eq!(value["Data"][0]["program_name"], "api");
        assert_eq!(value["Data"][0]["is_running"], true);
        assert_eq!(value["Data"][0]["command"], 1);
        assert_eq!(value["Data"][0]["restart_interval"], 10);
    }
}
