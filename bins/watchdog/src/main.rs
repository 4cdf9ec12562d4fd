use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use watchdog_process::SystemPlatform;
use watchdog_process_file::RegistryFile;
use watchdog_server::{CommandServer, ServerResult};
use watchdog_supervisor::{ControlApi, Reconciler, Registry, WatchdogConfig};

/// How long background tasks get to wind down after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Process watchdog
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML); defaults apply when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Registry file path (overrides config)
    #[arg(long, value_name = "FILE")]
    registry_file: Option<PathBuf>,

    /// Do not watch stdin for the `exit` command
    #[arg(long)]
    no_prompt: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => WatchdogConfig::load_from_file(path)?,
        None => WatchdogConfig::default(),
    };

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref path) = args.registry_file {
        config.registry_file.path = Some(path.clone());
    }
    config.validate()?;

    initialize_logging(args.debug, &config.log_level)?;

    info!("Starting watchdog");
    if let Some(ref path) = args.config {
        info!("Config file: {}", path.display());
    }

    let store = RegistryFile::from_config(&config.registry_file);
    info!("Registry file: {}", store.path().display());

    let registry = Arc::new(
        Registry::new(Arc::new(SystemPlatform::new()))
            .with_store(store)
            .with_timeouts(config.supervisor.timeouts()),
    );
    let api = ControlApi::new(Arc::clone(&registry));

    if let Err(e) = api.load_persisted().await {
        warn!("Starting with an empty registry: {}", e);
    }

    let shutdown = CancellationToken::new();

    let server = CommandServer::bind(
        config.server.listen_address(),
        api.clone(),
        config.server.status_interval,
    )
    .await
    .with_context(|| format!("Failed to bind {}", config.server.listen_address()))?;

    let reconciler =
        Reconciler::new(Arc::clone(&registry), config.supervisor.reconcile_interval).spawn(shutdown.clone());
    let mut server = server.spawn(shutdown.clone());

    if !args.no_prompt {
        watch_stdin(shutdown.clone()).context("Failed to start console watcher")?;
        info!("Type 'exit' to stop the watchdog");
    }

    let server_finished = wait_for_shutdown(shutdown_signal(), &shutdown, &mut server).await;

    info!("Shutting down watchdog...");
    shutdown.cancel();

    if tokio::time::timeout(SHUTDOWN_GRACE, reconciler).await.is_err() {
        warn!("Reconciler did not stop within {:?}", SHUTDOWN_GRACE);
    }
    if !server_finished && tokio::time::timeout(SHUTDOWN_GRACE, server).await.is_err() {
        warn!("Command server did not stop within {:?}", SHUTDOWN_GRACE);
    }

    api.persist().await;
    info!("Watchdog shut down");

    Ok(())
}

/// Wait for a signal, a cancel from the console, or the server ending.
///
/// Returns whether the server task already finished. A failed signal
/// handler is logged and treated as a shutdown request so the caller still
/// runs the orderly shutdown path.
async fn wait_for_shutdown(
    signal: impl Future<Output = Result<()>>,
    shutdown: &CancellationToken,
    server: &mut JoinHandle<ServerResult<()>>,
) -> bool {
    tokio::select! {
        result = signal => {
            if let Err(e) = result {
                error!("Signal handling failed, shutting down: {:#}", e);
            }
            false
        }
        _ = shutdown.cancelled() => false,
        result = server => {
            match result {
                Ok(Ok(())) => warn!("Command server exited unexpectedly"),
                Ok(Err(e)) => error!("Command server failed: {}", e),
                Err(e) => error!("Command server task failed: {}", e),
            }
            true
        }
    }
}

fn initialize_logging(debug: bool, configured_level: &str) -> Result<()> {
    let level = if debug { "debug" } else { configured_level };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

async fn shutdown_signal() -> Result<()> {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C signal");
    }

    Ok(())
}

/// Cancel `shutdown` when `exit` is typed on stdin.
///
/// Runs on a plain thread: a blocked console read must not hold up
/// runtime shutdown. A closed stdin just ends the watch.
fn watch_stdin(shutdown: CancellationToken) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) if line.trim().eq_ignore_ascii_case("exit") => {
                        info!("Exit requested from console");
                        shutdown.cancel();
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Stopped reading stdin: {}", e);
                        return;
                    }
                }
            }
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_server(shutdown: &CancellationToken) -> JoinHandle<ServerResult<()>> {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_signal_failure_falls_through_to_shutdown() {
        let shutdown = CancellationToken::new();
        let mut server = idle_server(&shutdown);

        let failing = async { Err(anyhow::anyhow!("no signal support")) };
        let server_finished = wait_for_shutdown(failing, &shutdown, &mut server).await;

        assert!(!server_finished);
        shutdown.cancel();
        assert!(server.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_console_cancel_ends_wait() {
        let shutdown = CancellationToken::new();
        let mut server = idle_server(&shutdown);
        shutdown.cancel();

        let server_finished =
            wait_for_shutdown(std::future::pending(), &shutdown, &mut server).await;
        assert!(!server_finished);
    }
}
