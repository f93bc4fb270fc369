use clap::{Args, Parser, Subcommand};

/// Runs a pool of identical HTTP workers on sequential ports, restarting
/// them when they crash and draining them on shutdown.
#[derive(Debug, Parser)]
#[command(name = "herd", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a single worker process. Spawned by the master; not meant to
    /// be invoked by hand.
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Port this worker binds
    #[arg(long)]
    pub port: u16,

    /// Host this worker binds
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Application reference to load
    #[arg(long)]
    pub server: String,

    /// Application configuration, as a JSON document
    #[arg(long, default_value = "{}")]
    pub config: String,

    /// Process display name, reported on the health endpoint
    #[arg(long, default_value = "herd-worker")]
    pub title: String,

    /// Allow a second signal to abort the drain and exit immediately
    #[arg(long)]
    pub allow_forced_exit: bool,
}
