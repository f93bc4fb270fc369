use crate::{
    ConnectionGauge, DrainController, HealthState, WorkerError, fault, health,
    error::Result as WorkerResult,
};

use std::panic::Location;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use error_location::ErrorLocation;
use log::{debug, error, info, warn};
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;

/// Process-boundary parameters a worker is launched with.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub host: String,
    pub port: u16,
    /// Display name, used as the log prefix
    pub title: String,
    /// Allows a second termination signal to abort a stuck drain
    pub allow_forced_exit: bool,
}

/// How the worker left its serve loop. The binary maps this to an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Drain completed with the gauge at zero
    Drained,
    /// Operator escape hatch fired while connections were still in flight
    Forced,
}

/// Wrap an application router with the harness stack: connection
/// accounting (outermost), the per-request fault boundary, and the
/// internal health/ready routes.
pub fn harness_router(app: Router, gauge: Arc<ConnectionGauge>, state: HealthState) -> Router {
    app.merge(health::internal_routes(state))
        .layer(middleware::from_fn(fault::request_boundary))
        .layer(middleware::from_fn_with_state(gauge, track_connections))
}

/// Serve the application until drained.
///
/// SIGTERM starts a drain: the listener stops accepting, and the process
/// exits once the connection gauge reaches zero (immediately when already
/// idle). SIGINT is ignored unless `allow_forced_exit` is set and a drain
/// is already underway. Any error escaping the serve loop is the
/// process-level fault path: log, drain what is left, and bubble the error
/// so the caller exits nonzero and the supervisor restarts the slot.
pub async fn run(settings: WorkerSettings, app: Router) -> WorkerResult<ExitKind> {
    let controller = DrainController::new();
    let gauge = controller.gauge();

    let app = harness_router(
        app,
        Arc::clone(&gauge),
        HealthState {
            gauge: Arc::clone(&gauge),
            port: settings.port,
            title: settings.title.clone(),
        },
    );

    let listener = TcpListener::bind((settings.host.as_str(), settings.port))
        .await
        .map_err(|e| WorkerError::Bind {
            port: settings.port,
            source: e,
            location: ErrorLocation::from(Location::caller()),
        })?;

    info!("{}: listening on {}:{}", settings.title, settings.host, settings.port);

    let forced = Arc::new(Notify::new());
    spawn_signal_task(&settings, controller.clone(), Arc::clone(&forced))?;

    let drain = controller.clone();
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        drain.wait_drain().await;
    });

    let title = settings.title;

    tokio::select! {
        result = serve => match result {
            Ok(()) => {
                // The listener is closed; the gauge is the sole exit gate.
                gauge.wait_idle().await;
                info!("{title}: drain complete, exiting");
                Ok(ExitKind::Drained)
            }
            Err(e) => {
                error!("{title}: fatal serve error: {e}");
                controller.request_drain();
                gauge.wait_idle().await;
                Err(WorkerError::Serve {
                    source: e,
                    location: ErrorLocation::from(Location::caller()),
                })
            }
        },
        _ = forced.notified() => {
            warn!(
                "{title}: forced exit with {} connection(s) still in flight",
                gauge.active()
            );
            Ok(ExitKind::Forced)
        }
    }
}

/// Connection accounting middleware. The permit is RAII so the count
/// unwinds even when the inner boundary absorbs a panic.
async fn track_connections(
    State(gauge): State<Arc<ConnectionGauge>>,
    req: Request,
    next: Next,
) -> Response {
    let _permit = gauge.acquire();
    next.run(req).await
}

fn spawn_signal_task(
    settings: &WorkerSettings,
    controller: DrainController,
    forced: Arc<Notify>,
) -> WorkerResult<()> {
    let mut term = signal(SignalKind::terminate()).map_err(|e| WorkerError::Signal {
        source: e,
        location: ErrorLocation::from(Location::caller()),
    })?;
    let mut int = signal(SignalKind::interrupt()).map_err(|e| WorkerError::Signal {
        source: e,
        location: ErrorLocation::from(Location::caller()),
    })?;

    let allow_forced_exit = settings.allow_forced_exit;
    let title = settings.title.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = term.recv() => {
                    if !controller.is_draining() {
                        info!("{title}: received SIGTERM, draining");
                        controller.request_drain();
                    } else if allow_forced_exit {
                        forced.notify_one();
                    } else {
                        debug!("{title}: already draining, ignoring repeat SIGTERM");
                    }
                }
                _ = int.recv() => {
                    if allow_forced_exit && controller.is_draining() {
                        forced.notify_one();
                    } else {
                        debug!("{title}: ignoring SIGINT");
                    }
                }
            }
        }
    });

    Ok(())
}
