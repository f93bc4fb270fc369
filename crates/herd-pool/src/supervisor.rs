use crate::error::Result as PoolResult;
use crate::event::PoolEvent;
use crate::probe::{HttpProber, ReadyCheck};
use crate::session::{CompletionAction, ShutdownSession};
use crate::slot::{SlotState, WorkerSlot};
use crate::spawner::{Spawner, WorkerExit, WorkerSpec};
use crate::PoolError;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use herd_config::{Config, RestartConfig};
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot, watch};

const EVENT_QUEUE_DEPTH: usize = 64;

/// Point-in-time view of one slot, published after every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub index: usize,
    pub port: u16,
    pub state: SlotState,
    pub pid: Option<u32>,
}

pub type PoolStatus = Vec<SlotSnapshot>;

/// Handle for talking to a running supervisor from signal handlers, watch
/// services, and tests.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<PoolEvent>,
    status_rx: watch::Receiver<PoolStatus>,
}

impl SupervisorHandle {
    /// Drain the fleet and stop the supervisor. Resolves when every worker
    /// has confirmed exit. Safe to call more than once: a call while a
    /// session is in flight attaches to it instead of starting another.
    pub async fn shutdown(&self, graceful: bool) -> PoolResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(PoolEvent::ShutdownFleet {
                graceful,
                done: Some(done_tx),
            })
            .await
            .map_err(|_| PoolError::supervisor_gone())?;
        done_rx.await.map_err(|_| PoolError::supervisor_gone())
    }

    /// Drain the fleet and respawn it with the same port layout. Dropped
    /// (resolving immediately) when a session is already in flight.
    pub async fn restart(&self, graceful: bool) -> PoolResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(PoolEvent::RestartFleet {
                graceful,
                done: Some(done_tx),
            })
            .await
            .map_err(|_| PoolError::supervisor_gone())?;
        done_rx.await.map_err(|_| PoolError::supervisor_gone())
    }

    /// Watch-service callback entry point. Bursts are debounced into a
    /// single graceful fleet restart.
    pub async fn path_changed(&self, path: PathBuf) -> PoolResult<()> {
        self.tx
            .send(PoolEvent::PathChanged { path })
            .await
            .map_err(|_| PoolError::supervisor_gone())
    }

    /// Subscribe to slot-state snapshots.
    pub fn status(&self) -> watch::Receiver<PoolStatus> {
        self.status_rx.clone()
    }
}

/// Owns the pool. All slot and session state lives on the event loop in
/// `run`, so every transition is serialized and lock-free; handlers must
/// stay short for the fleet to remain responsive.
pub struct Supervisor {
    config: Config,
    spawner: Arc<dyn Spawner>,
    slots: Vec<WorkerSlot>,
    session: Option<ShutdownSession>,
    session_seq: u64,
    generation_seq: u64,
    debounce_seq: u64,
    events: mpsc::Receiver<PoolEvent>,
    self_tx: mpsc::Sender<PoolEvent>,
    status_tx: watch::Sender<PoolStatus>,
    prober: Option<Arc<dyn ReadyCheck>>,
    stopped: bool,
}

impl Supervisor {
    pub fn new(config: Config, spawner: Arc<dyn Spawner>) -> (Self, SupervisorHandle) {
        let prober = (config.pool.ready_timeout_secs > 0).then(|| {
            Arc::new(HttpProber::new(config.pool.host.clone())) as Arc<dyn ReadyCheck>
        });
        Self::with_prober(config, spawner, prober)
    }

    pub(crate) fn with_prober(
        config: Config,
        spawner: Arc<dyn Spawner>,
        prober: Option<Arc<dyn ReadyCheck>>,
    ) -> (Self, SupervisorHandle) {
        let (self_tx, events) = mpsc::channel(EVENT_QUEUE_DEPTH);

        let slots: Vec<WorkerSlot> = (0..config.pool.workers)
            .map(|index| WorkerSlot::new(index, config.pool.port_for(index)))
            .collect();

        let (status_tx, status_rx) = watch::channel(Vec::new());

        let handle = SupervisorHandle {
            tx: self_tx.clone(),
            status_rx,
        };

        let supervisor = Self {
            config,
            spawner,
            slots,
            session: None,
            session_seq: 0,
            generation_seq: 0,
            debounce_seq: 0,
            events,
            self_tx,
            status_tx,
            prober,
            stopped: false,
        };

        (supervisor, handle)
    }

    /// Start the pool and process events until a shutdown session
    /// completes.
    pub async fn run(mut self) -> PoolResult<()> {
        info!(
            "Starting pool: {} worker(s) from port {}",
            self.slots.len(),
            self.config.pool.base_port
        );

        self.start_pool().await?;
        self.publish_status();

        while let Some(event) = self.events.recv().await {
            self.handle_event(event).await;
            self.publish_status();

            if self.stopped {
                break;
            }
        }

        info!("Supervisor stopped");
        Ok(())
    }

    async fn handle_event(&mut self, event: PoolEvent) {
        match event {
            PoolEvent::WorkerExited {
                slot,
                generation,
                exit,
            } => self.on_worker_exit(slot, generation, exit).await,
            PoolEvent::WorkerReady { slot, generation } => self.on_worker_ready(slot, generation),
            PoolEvent::RestartSlot { slot, generation } => {
                self.on_restart_timer(slot, generation).await
            }
            PoolEvent::ShutdownFleet { graceful, done } => {
                self.shutdown_fleet(graceful, done).await
            }
            PoolEvent::RestartFleet { graceful, done } => self.restart_fleet(graceful, done).await,
            PoolEvent::PathChanged { path } => self.on_path_changed(path),
            PoolEvent::DebounceExpired { seq } => self.on_debounce_expired(seq).await,
            PoolEvent::DrainDeadline { session_id } => self.on_drain_deadline(session_id),
        }
    }

    async fn start_pool(&mut self) -> PoolResult<()> {
        for index in 0..self.slots.len() {
            self.spawn_slot(index).await?;
        }
        Ok(())
    }

    /// Put a fresh process into a slot. The only path through which a slot
    /// leaves `Exited`.
    async fn spawn_slot(&mut self, index: usize) -> PoolResult<()> {
        self.generation_seq += 1;
        let generation = self.generation_seq;

        let spec = WorkerSpec {
            slot: index,
            port: self.slots[index].port,
            host: self.config.pool.host.clone(),
            server: self.config.pool.server.clone(),
            config: self.config.pool.app_config.clone(),
            allow_forced_exit: self.config.pool.allow_forced_exit,
            title: self.config.pool.title.clone(),
        };

        let spawned = self.spawner.spawn(&spec).await?;
        info!(
            "Worker {} started on port {} (pid {})",
            index, spec.port, spawned.pid
        );

        let slot = &mut self.slots[index];
        slot.pid = Some(spawned.pid);
        slot.generation = generation;
        slot.state = SlotState::Starting;

        // Exit waiter: resolves only after the process fully terminated
        let exit_tx = self.self_tx.clone();
        let exit = spawned.exit;
        tokio::spawn(async move {
            let status = exit.await;
            let _ = exit_tx
                .send(PoolEvent::WorkerExited {
                    slot: index,
                    generation,
                    exit: status,
                })
                .await;
        });

        match &self.prober {
            Some(prober) => {
                let prober = prober.clone();
                let port = spec.port;
                let timeout = Duration::from_secs(self.config.pool.ready_timeout_secs);
                let ready_tx = self.self_tx.clone();
                tokio::spawn(async move {
                    if prober.wait_ready(port, timeout).await {
                        let _ = ready_tx
                            .send(PoolEvent::WorkerReady {
                                slot: index,
                                generation,
                            })
                            .await;
                    } else {
                        warn!(
                            "Worker {index} on port {port} did not become ready within {timeout:?}"
                        );
                    }
                });
            }
            None => {
                self.slots[index].state = SlotState::Running;
            }
        }

        Ok(())
    }

    fn on_worker_ready(&mut self, index: usize, generation: u64) {
        let slot = &mut self.slots[index];
        if slot.generation != generation || !slot.is_live() {
            return;
        }
        if slot.state == SlotState::Starting {
            debug!("Worker {index} ready on port {}", slot.port);
            slot.state = SlotState::Running;
        }
    }

    /// The crash-restart policy. An unexpected exit is recovered locally;
    /// during a session it only counts toward the drain tally.
    async fn on_worker_exit(&mut self, index: usize, generation: u64, exit: WorkerExit) {
        if self.slots[index].generation != generation {
            debug!("Ignoring exit event from a previous occupant of slot {index}");
            return;
        }

        let port = self.slots[index].port;
        self.slots[index].pid = None;
        self.slots[index].state = SlotState::Exited;

        if let Some(session) = self.session.as_mut() {
            session.confirm_exit(index);
            let remaining = session.outstanding.len();
            let complete = session.is_complete();
            info!("Worker {index} (port {port}) exited, {remaining} remaining in session");
            if complete {
                self.complete_session().await;
            }
            return;
        }

        if exit.is_abnormal() {
            warn!(
                "Worker {index} (port {port}) exited abnormally (code: {:?}, signal: {:?})",
                exit.code, exit.signal
            );
            self.schedule_restart(index);
        } else {
            info!("Worker {index} (port {port}) exited cleanly, not restarting");
        }
    }

    /// Defer the relaunch so a crash loop cannot consume the CPU, growing
    /// the delay while failures stay rapid.
    fn schedule_restart(&mut self, index: usize) {
        if self.slots[index].restart_pending {
            debug!("Restart already scheduled for slot {index}");
            return;
        }

        let window = Duration::from_secs(self.config.restart.window_secs);
        let failures = self.slots[index].record_failure(window);

        let breaker = self.config.restart.max_rapid_failures;
        if breaker > 0 && failures > breaker {
            self.slots[index].state = SlotState::Failed;
            error!(
                "Worker {index} crashed {failures} times in quick succession; \
                 auto-restart stopped, port {} is vacant until a fleet restart",
                self.slots[index].port
            );
            return;
        }

        let delay = restart_delay(failures, &self.config.restart);
        info!("Restarting worker {index} in {delay:?} (rapid failure {failures})");

        self.slots[index].restart_pending = true;
        let generation = self.slots[index].generation;
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx
                .send(PoolEvent::RestartSlot {
                    slot: index,
                    generation,
                })
                .await;
        });
    }

    /// A scheduled restart re-checks the slot at fire time: another path
    /// may have refilled it, and two processes must never share a port.
    async fn on_restart_timer(&mut self, index: usize, generation: u64) {
        self.slots[index].restart_pending = false;

        let slot = &self.slots[index];
        if self.session.is_some()
            || slot.generation != generation
            || slot.is_live()
            || slot.state == SlotState::Failed
        {
            debug!("Skipping scheduled restart for slot {index}");
            return;
        }

        if let Err(e) = self.spawn_slot(index).await {
            error!("Failed to respawn worker {index}: {e}");
            self.slots[index].state = SlotState::Failed;
        }
    }

    async fn shutdown_fleet(&mut self, graceful: bool, done: Option<oneshot::Sender<()>>) {
        if let Some(session) = self.session.as_mut() {
            // A shutdown always wins over an in-flight restart: the fleet
            // is already draining, so the session keeps its tally but the
            // drained fleet must stay down and the supervisor must stop.
            if session.action == CompletionAction::Restart {
                info!("Shutdown requested during a fleet restart; the fleet will not be respawned");
                session.action = CompletionAction::Exit;
            } else {
                debug!("Shutdown already in progress; attaching to the active session");
            }
            if let Some(done) = done {
                session.listeners.push(done);
            }
            return;
        }

        self.begin_session(graceful, CompletionAction::Exit, done)
            .await;
    }

    async fn restart_fleet(&mut self, graceful: bool, done: Option<oneshot::Sender<()>>) {
        if self.session.is_some() {
            debug!("Restart request dropped, a shutdown/restart is already in progress");
            if let Some(done) = done {
                let _ = done.send(());
            }
            return;
        }

        self.begin_session(graceful, CompletionAction::Restart, done)
            .await;
    }

    async fn begin_session(
        &mut self,
        graceful: bool,
        action: CompletionAction,
        done: Option<oneshot::Sender<()>>,
    ) {
        self.session_seq += 1;
        let mut session = ShutdownSession::new(self.session_seq, action);
        if let Some(done) = done {
            session.listeners.push(done);
        }

        let live: Vec<(usize, u32)> = self
            .slots
            .iter()
            .filter_map(|slot| slot.pid.map(|pid| (slot.index, pid)))
            .collect();

        info!(
            "{} fleet {}: {} live worker(s)",
            if graceful { "Graceful" } else { "Forced" },
            match action {
                CompletionAction::Exit => "shutdown",
                CompletionAction::Restart => "restart",
            },
            live.len()
        );

        for (index, pid) in live {
            session.outstanding.insert(index);
            self.slots[index].state = SlotState::Draining;
            if let Err(e) = self.spawner.terminate(pid, !graceful) {
                // Likely already gone; its exit event settles the tally
                warn!("Failed to signal worker {index} (pid {pid}): {e}");
            }
        }

        if graceful && !session.is_complete() && self.config.drain.deadline_secs > 0 {
            let session_id = session.id;
            let deadline = Duration::from_secs(self.config.drain.deadline_secs);
            let tx = self.self_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                let _ = tx.send(PoolEvent::DrainDeadline { session_id }).await;
            });
        }

        let complete = session.is_complete();
        self.session = Some(session);
        if complete {
            self.complete_session().await;
        }
    }

    async fn complete_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        match session.action {
            CompletionAction::Exit => {
                info!("Fleet shutdown complete");
                self.stopped = true;
            }
            CompletionAction::Restart => {
                info!("Fleet drained, respawning {} worker(s)", self.slots.len());
                for index in 0..self.slots.len() {
                    // An operator-initiated restart gives crash-looping
                    // slots a fresh start
                    self.slots[index].reset_failures();
                    if self.slots[index].state == SlotState::Failed {
                        self.slots[index].state = SlotState::Exited;
                    }
                    if let Err(e) = self.spawn_slot(index).await {
                        error!("Failed to respawn worker {index}: {e}");
                        self.slots[index].state = SlotState::Failed;
                    }
                }
            }
        }

        for listener in session.listeners {
            let _ = listener.send(());
        }
    }

    fn on_drain_deadline(&mut self, session_id: u64) {
        let Some(session) = &self.session else {
            return;
        };
        if session.id != session_id {
            return;
        }

        let stragglers: Vec<(usize, u32)> = session
            .outstanding
            .iter()
            .filter_map(|&index| self.slots[index].pid.map(|pid| (index, pid)))
            .collect();

        for (index, pid) in stragglers {
            warn!(
                "Worker {index} (pid {pid}) exceeded the {}s drain deadline, force killing",
                self.config.drain.deadline_secs
            );
            if let Err(e) = self.spawner.terminate(pid, true) {
                warn!("Failed to force kill worker {index} (pid {pid}): {e}");
            }
        }
    }

    fn on_path_changed(&mut self, path: PathBuf) {
        info!("{} changed", path.display());

        // Trailing-edge debounce: every change restarts the quiet period,
        // and only the newest timer is honored when it fires
        self.debounce_seq += 1;
        let seq = self.debounce_seq;
        let quiet = Duration::from_millis(self.config.pool.watch_debounce_ms);
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let _ = tx.send(PoolEvent::DebounceExpired { seq }).await;
        });
    }

    async fn on_debounce_expired(&mut self, seq: u64) {
        if seq != self.debounce_seq {
            return;
        }
        info!("Restarting workers");
        self.restart_fleet(true, None).await;
    }

    fn publish_status(&self) {
        let status: PoolStatus = self
            .slots
            .iter()
            .map(|slot| SlotSnapshot {
                index: slot.index,
                port: slot.port,
                state: slot.state,
                pid: slot.pid,
            })
            .collect();
        let _ = self.status_tx.send(status);
    }
}

/// Backoff for crash restarts: the base delay doubles per rapid
/// consecutive failure, up to the configured cap.
pub(crate) fn restart_delay(rapid_failures: u32, restart: &RestartConfig) -> Duration {
    let exponent = rapid_failures.saturating_sub(1).min(16);
    let delay = restart
        .initial_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(restart.max_delay_ms);
    Duration::from_millis(delay)
}
