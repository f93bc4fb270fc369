use crate::{PoolError, PoolResult};

use std::panic::Location;
use std::path::PathBuf;

use async_trait::async_trait;
use error_location::ErrorLocation;
use futures::future::BoxFuture;
use log::error;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

/// Launch parameters for one worker process (the process-boundary
/// contract between master and worker).
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub slot: usize,
    pub port: u16,
    pub host: String,
    /// Application reference the worker should load
    pub server: String,
    /// Application configuration blob, forwarded as JSON
    pub config: serde_json::Value,
    pub allow_forced_exit: bool,
    /// Process display name
    pub title: String,
}

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl WorkerExit {
    /// Anything but an explicit zero exit counts as abnormal; `code: None`
    /// means killed by a signal.
    pub fn is_abnormal(&self) -> bool {
        self.code != Some(0)
    }
}

#[cfg(unix)]
impl From<std::process::ExitStatus> for WorkerExit {
    fn from(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

/// A launched worker: its pid plus a future resolving when the OS process
/// has fully terminated (exit events are therefore never observed early).
pub struct SpawnedWorker {
    pub pid: u32,
    pub exit: BoxFuture<'static, WorkerExit>,
}

/// Seam between the supervisor and the operating system. The supervisor
/// only ever starts workers and delivers termination requests through
/// this trait.
#[async_trait]
pub trait Spawner: Send + Sync + 'static {
    async fn spawn(&self, spec: &WorkerSpec) -> PoolResult<SpawnedWorker>;

    /// Deliver a termination request: cooperative drain when `forced` is
    /// false, immediate kill when true.
    fn terminate(&self, pid: u32, forced: bool) -> PoolResult<()>;
}

/// Spawns real worker processes: `<program> <args..> worker --port N ...`.
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessSpawner {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Spawn workers from the currently running executable.
    pub fn from_current_exe(args: Vec<String>) -> PoolResult<Self> {
        let program = std::env::current_exe()?;
        Ok(Self::new(program, args))
    }
}

#[async_trait]
impl Spawner for ProcessSpawner {
    async fn spawn(&self, spec: &WorkerSpec) -> PoolResult<SpawnedWorker> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--port")
            .arg(spec.port.to_string())
            .arg("--host")
            .arg(&spec.host)
            .arg("--server")
            .arg(&spec.server)
            .arg("--config")
            .arg(spec.config.to_string())
            .arg("--title")
            .arg(&spec.title);

        if spec.allow_forced_exit {
            cmd.arg("--allow-forced-exit");
        }

        // New session: terminal signals reach workers only through the
        // supervisor's own termination protocol.
        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|e| PoolError::spawn(spec.slot, e))?;

        let pid = child.id().ok_or_else(|| {
            PoolError::spawn(
                spec.slot,
                std::io::Error::other("spawned process has no pid"),
            )
        })?;

        let slot = spec.slot;
        let exit = Box::pin(async move {
            match child.wait().await {
                Ok(status) => WorkerExit::from(status),
                Err(e) => {
                    error!("Failed to wait on worker {slot} (pid {pid}): {e}");
                    WorkerExit {
                        code: None,
                        signal: None,
                    }
                }
            }
        });

        Ok(SpawnedWorker { pid, exit })
    }

    fn terminate(&self, pid: u32, forced: bool) -> PoolResult<()> {
        let signal = if forced {
            Signal::SIGKILL
        } else {
            Signal::SIGTERM
        };

        kill(Pid::from_raw(pid as i32), signal).map_err(|source| PoolError::Signal {
            pid,
            source,
            location: ErrorLocation::from(Location::caller()),
        })
    }
}
