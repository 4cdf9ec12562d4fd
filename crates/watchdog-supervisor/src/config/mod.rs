use crate::lifecycle::OperationTimeouts;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use watchdog_process_file::RegistryFileConfig;

pub mod validation;

/// Top-level configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub registry_file: RegistryFileConfig,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            supervisor: SupervisorConfig::default(),
            registry_file: RegistryFileConfig::default(),
        }
    }
}

/// Command server options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Period of status pushes to subscribed connections.
    #[serde(default = "default_status_interval", with = "duration_serde")]
    pub status_interval: Duration,
}

impl ServerConfig {
    /// `address:port` suitable for `TcpListener::bind`.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            status_interval: default_status_interval(),
        }
    }
}

/// Reconciler and OS call options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_reconcile_interval", with = "duration_serde")]
    pub reconcile_interval: Duration,
    #[serde(default = "default_operation_timeout", with = "duration_serde")]
    pub launch_timeout: Duration,
    #[serde(default = "default_operation_timeout", with = "duration_serde")]
    pub terminate_timeout: Duration,
    #[serde(default = "default_operation_timeout", with = "duration_serde")]
    pub snapshot_timeout: Duration,
}

impl SupervisorConfig {
    pub fn timeouts(&self) -> OperationTimeouts {
        OperationTimeouts {
            launch: self.launch_timeout,
            terminate: self.terminate_timeout,
            snapshot: self.snapshot_timeout,
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: default_reconcile_interval(),
            launch_timeout: default_operation_timeout(),
            terminate_timeout: default_operation_timeout(),
            snapshot_timeout: default_operation_timeout(),
        }
    }
}

impl WatchdogConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: WatchdogConfig = serde_yaml::from_str(content)
            .context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_status_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_reconcile_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(10)
}

// Durations are written as "<n>ms", "<n>s" or "<n>m".
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() != 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(s.trim()).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let parse = |num: &str| num.trim().parse::<u64>().map_err(|_| format!("Invalid duration: {}", s));

        // "ms" first, it also ends with 's'
        if let Some(num) = s.strip_suffix("ms") {
            Ok(Duration::from_millis(parse(num)?))
        } else if let Some(num) = s.strip_suffix('s') {
            Ok(Duration::from_secs(parse(num)?))
        } else if let Some(num) = s.strip_suffix('m') {
            Ok(Duration::from_secs(parse(num)?.saturating_mul(60)))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}
