//! # Watchdog Process File
//!
//! Registry persistence for the watchdog.
//!
//! This crate provides:
//! - Saving the registry to disk as a JSON array (atomic write)
//! - Loading it back on startup
//! - Platform-specific default location
//!
//! The record type is generic; the supervisor owns the schema.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use watchdog_common::{ProcessError, ProcessResult};

/// Default application name, used as the data subdirectory.
pub const DEFAULT_APP_NAME: &str = "watchdog";

/// Default registry file name.
pub const DEFAULT_FILE_NAME: &str = "processes.json";

/// Where the registry file lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFileConfig {
    /// Explicit file path. Takes precedence over `base_directory`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Directory holding `processes.json` (if empty, uses OS default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_directory: Option<PathBuf>,
}

impl RegistryFileConfig {
    /// Resolve the registry file path.
    pub fn resolve_path(&self) -> PathBuf {
        if let Some(ref path) = self.path {
            return path.clone();
        }

        let base = match self.base_directory {
            Some(ref dir) => dir.clone(),
            None => default_base_directory(),
        };
        base.join(DEFAULT_FILE_NAME)
    }
}

/// Platform local data directory plus the application subdirectory.
///
/// Windows: `%LOCALAPPDATA%\watchdog`, Linux: `~/.local/share/watchdog`,
/// macOS: `~/Library/Application Support/watchdog`.
pub fn default_base_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(".local/share")
        })
        .join(DEFAULT_APP_NAME)
}

/// Registry file on disk.
#[derive(Debug, Clone)]
pub struct RegistryFile {
    path: PathBuf,
}

impl RegistryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &RegistryFileConfig) -> Self {
        Self::new(config.resolve_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save records to disk (atomic write).
    ///
    /// The array is written to a sibling temp file and renamed over the
    /// target, so readers never see a half-written file.
    pub async fn save<T: Serialize>(&self, records: &[T]) -> ProcessResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error(format!("failed to create directory {}: {}", parent.display(), e)))?;
        }

        let json = serde_json::to_string_pretty(records)
            .map_err(|e| self.error(format!("failed to serialize registry: {}", e)))?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json)
            .await
            .map_err(|e| self.error(format!("failed to write temp file: {}", e)))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.error(format!("failed to rename temp file: {}", e)))?;

        debug!("Saved {} records to {}", records.len(), self.path.display());
        Ok(())
    }

    /// Load records from disk. A missing file yields an empty list.
    pub async fn load<T: DeserializeOwned>(&self) -> ProcessResult<Vec<T>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No registry file at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.error(format!("failed to read registry file: {}", e))),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content)
            .map_err(|e| self.error(format!("failed to parse registry file: {}", e)))
    }

    fn error(&self, reason: String) -> ProcessError {
        ProcessError::persistence(self.path.display().to_string(), reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Record {
        program_name: String,
        auto_restart: bool,
    }

    fn records() -> Vec<Record> {
        vec![
            Record { program_name: "api".to_string(), auto_restart: true },
            Record { program_name: "worker".to_string(), auto_restart: false },
        ]
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = RegistryFile::new(dir.path().join("nested").join("processes.json"));

        file.save(&records()).await.unwrap();
        let loaded: Vec<Record> = file.load().await.unwrap();

        assert_eq!(loaded, records());
        assert!(!dir.path().join("nested").join("processes.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_saved_file_is_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let file = RegistryFile::new(dir.path().join("processes.json"));
        file.save(&records()).await.unwrap();

        let raw = std::fs::read_to_string(file.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["programName"], "api");
        assert_eq!(value[1]["autoRestart"], false);
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = RegistryFile::new(dir.path().join("absent.json"));
        let loaded: Vec<Record> = file.load().await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processes.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = RegistryFile::new(&path).load::<Record>().await.unwrap_err();
        assert!(matches!(err, ProcessError::Persistence { .. }));
    }

    #[test]
    fn test_resolve_path() {
        let explicit = RegistryFileConfig {
            path: Some(PathBuf::from("/srv/watchdog/state.json")),
            base_directory: Some(PathBuf::from("/ignored")),
        };
        assert_eq!(explicit.resolve_path(), PathBuf::from("/srv/watchdog/state.json"));

        let base = RegistryFileConfig {
            path: None,
            base_directory: Some(PathBuf::from("/var/lib/watchdog")),
        };
        assert_eq!(base.resolve_path(), PathBuf::from("/var/lib/watchdog/processes.json"));

        let default = RegistryFileConfig::default().resolve_path();
        assert!(default.ends_with("watchdog/processes.json"));
    }
}
