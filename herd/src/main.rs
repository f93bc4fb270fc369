mod app;
mod cli;
mod error;
mod logger;
mod master;
mod worker;


use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Command};
use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Worker(args)) => match worker::run(args).await {
            // Both drain outcomes are deliberate exits and must not look
            // like crashes to the supervisor
            Ok(kind) => {
                info!("Worker exiting ({kind:?})");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Worker failed: {e}");
                eprintln!("herd worker: {e}");
                ExitCode::FAILURE
            }
        },
        None => match master::run().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Master failed: {e}");
                eprintln!("herd: {e}");
                ExitCode::FAILURE
            }
        },
    }
}
