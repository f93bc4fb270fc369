use crate::error::{HerdError, Result as HerdResult};

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::State, routing::get};
use serde::Deserialize;

/// Configuration blob forwarded by the master, unchanged, to every worker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct DemoConfig {
    greeting: String,
    slow_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            greeting: String::from("Hello from the herd"),
            slow_ms: 1_000,
        }
    }
}

/// Resolve an application reference to a router.
///
/// Applications are compiled in and the reference names one of them.
/// Embedders hand `herd_worker::run` their own `axum::Router` directly;
/// this registry only serves the standalone binary.
pub fn load_app(reference: &str, config: &serde_json::Value) -> HerdResult<Router> {
    match reference {
        "demo" => demo_app(config),
        _ => Err(HerdError::unknown_app(reference)),
    }
}

fn demo_app(config: &serde_json::Value) -> HerdResult<Router> {
    let config: DemoConfig = if config.is_null() {
        DemoConfig::default()
    } else {
        serde_json::from_value(config.clone())?
    };
    let config = Arc::new(config);

    Ok(Router::new()
        .route("/", get(index))
        .route("/slow", get(slow))
        .route("/boom", get(boom))
        .with_state(config))
}

async fn index(State(config): State<Arc<DemoConfig>>) -> String {
    config.greeting.clone()
}

async fn slow(State(config): State<Arc<DemoConfig>>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(config.slow_ms)).await;
    "done"
}

async fn boom() -> &'static str {
    panic!("boom requested");
}
