use crate::error::Result as HerdResult;
use crate::logger;

use std::path::PathBuf;
use std::sync::Arc;

use herd_config::Config;
use herd_pool::{ProcessSpawner, Supervisor, SupervisorHandle};
use log::{error, info};
use tokio::signal::unix::{SignalKind, signal};

/// Master mode: load configuration, start the pool, and run the
/// supervisor until the fleet has shut down.
pub async fn run() -> HerdResult<()> {
    let config = Config::load()?;
    config.validate()?;

    let log_file_path: Option<PathBuf> = if let Some(ref filename) = config.logging.file {
        let config_dir = Config::config_dir()?;
        let log_dir = config_dir.join(&config.logging.dir);
        std::fs::create_dir_all(&log_dir)?;
        Some(log_dir.join(filename))
    } else {
        None
    };

    logger::initialize(config.logging.level, log_file_path, config.logging.colored)?;

    info!("Starting herd v{}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    // Workers are this same executable in worker mode
    let spawner = Arc::new(ProcessSpawner::from_current_exe(vec![String::from(
        "worker",
    )])?);

    let (supervisor, handle) = Supervisor::new(config, spawner);
    spawn_signal_task(handle);

    supervisor.run().await?;
    info!("herd stopped");
    Ok(())
}

/// SIGTERM/SIGINT drain the fleet and stop; SIGHUP drains and respawns it.
fn spawn_signal_task(handle: SupervisorHandle) {
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGINT handler: {e}");
                return;
            }
        };
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGHUP handler: {e}");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, draining the fleet");
                    if let Err(e) = handle.shutdown(true).await {
                        error!("Shutdown failed: {e}");
                    }
                    return;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT (Ctrl+C), draining the fleet");
                    if let Err(e) = handle.shutdown(true).await {
                        error!("Shutdown failed: {e}");
                    }
                    return;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, restarting the fleet");
                    if let Err(e) = handle.restart(true).await {
                        error!("Fleet restart failed: {e}");
                    }
                }
            }
        }
    });
}
