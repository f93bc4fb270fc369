use crate::{
    ConfigError, ConfigErrorResult, DEFAULT_BASE_PORT, DEFAULT_HOST, DEFAULT_READY_TIMEOUT_SECS,
    DEFAULT_WATCH_DEBOUNCE_MS, DEFAULT_WORKERS, MAX_WORKERS, MIN_PORT,
};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker processes
    pub workers: usize,
    /// First port; worker `i` binds `base_port + i`
    pub base_port: u16,
    /// Host workers bind to
    pub host: String,
    /// Application reference handed to every worker
    pub server: String,
    /// Application configuration blob, forwarded verbatim as JSON
    pub app_config: serde_json::Value,
    /// Worker process display name
    pub title: String,
    /// Enables the forced-exit escape hatch while a worker drains
    pub allow_forced_exit: bool,
    /// Quiet period for coalescing watch events
    pub watch_debounce_ms: u64,
    /// How long to poll a worker's ready endpoint after spawn (0 = don't probe)
    pub ready_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            base_port: DEFAULT_BASE_PORT,
            host: String::from(DEFAULT_HOST),
            server: String::new(),
            app_config: serde_json::Value::Object(serde_json::Map::new()),
            title: String::from("herd-worker"),
            allow_forced_exit: false,
            watch_debounce_ms: DEFAULT_WATCH_DEBOUNCE_MS,
            ready_timeout_secs: DEFAULT_READY_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::pool(format!(
                "pool.workers must be 1-{}, got {}",
                MAX_WORKERS, self.workers
            )));
        }

        if self.base_port < MIN_PORT {
            return Err(ConfigError::pool(format!(
                "pool.base_port must be >= {}, got {}",
                MIN_PORT, self.base_port
            )));
        }

        // The highest slot port must still fit in u16
        let span = (self.workers - 1) as u32;
        if u32::from(self.base_port) + span > u32::from(u16::MAX) {
            return Err(ConfigError::pool(format!(
                "pool.base_port {} + {} workers overflows the port range",
                self.base_port, self.workers
            )));
        }

        if self.server.is_empty() {
            return Err(ConfigError::pool("pool.server must not be empty"));
        }

        Ok(())
    }

    /// Port assigned to a slot index. Stable for the pool's lifetime.
    pub fn port_for(&self, slot: usize) -> u16 {
        self.base_port + slot as u16
    }
}
