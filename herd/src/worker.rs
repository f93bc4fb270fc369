use crate::app;
use crate::cli::WorkerArgs;
use crate::error::Result as HerdResult;
use crate::logger;

use std::str::FromStr;

use herd_config::LogLevel;
use herd_worker::{ExitKind, WorkerSettings};

/// Worker mode: load the application and serve until drained.
pub async fn run(args: WorkerArgs) -> HerdResult<ExitKind> {
    let level = std::env::var("HERD_LOG_LEVEL")
        .ok()
        .and_then(|s| LogLevel::from_str(&s).ok())
        .unwrap_or_default();

    // Workers inherit the master's stdout; no colors, no file
    logger::initialize(level, None, false)?;

    let config: serde_json::Value = serde_json::from_str(&args.config)?;
    let app = app::load_app(&args.server, &config)?;

    let settings = WorkerSettings {
        host: args.host,
        port: args.port,
        title: args.title,
        allow_forced_exit: args.allow_forced_exit,
    };

    Ok(herd_worker::run(settings, app).await?)
}
