use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &WatchdogConfig) -> Result<()> {
    validate_log_level(&config.log_level)?;
    validate_server_config(&config.server)?;
    validate_supervisor_config(&config.supervisor)?;
    validate_registry_file_config(&config.registry_file)?;
    Ok(())
}

fn validate_log_level(level: &str) -> Result<()> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            level
        )),
    }
}

fn validate_server_config(server: &ServerConfig) -> Result<()> {
    if server.bind_address.trim().is_empty() {
        return Err(anyhow!("Server bind address cannot be empty"));
    }

    if server.port == 0 {
        return Err(anyhow!("Port must be between 1 and 65535, got: {}", server.port));
    }

    if server.status_interval.is_zero() {
        return Err(anyhow!("Status interval must be greater than 0"));
    }

    Ok(())
}

fn validate_supervisor_config(supervisor: &SupervisorConfig) -> Result<()> {
    if supervisor.reconcile_interval.is_zero() {
        return Err(anyhow!("Reconcile interval must be greater than 0"));
    }

    if supervisor.launch_timeout.is_zero() {
        return Err(anyhow!("Launch timeout must be greater than 0"));
    }

    if supervisor.terminate_timeout.is_zero() {
        return Err(anyhow!("Terminate timeout must be greater than 0"));
    }

    if supervisor.snapshot_timeout.is_zero() {
        return Err(anyhow!("Snapshot timeout must be greater than 0"));
    }

    Ok(())
}

fn validate_registry_file_config(registry_file: &RegistryFileConfig) -> Result<()> {
    if let Some(ref path) = registry_file.path {
        if path.as_os_str().is_empty() {
            return Err(anyhow!("Registry file path cannot be empty"));
        }
        if path.is_dir() {
            return Err(anyhow!("Registry file path is a directory: {}", path.display()));
        }
    }
    Ok(())
}
