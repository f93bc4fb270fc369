use crate::{
    ConfigError, ConfigErrorResult, DEFAULT_RESTART_INITIAL_DELAY_MS, DEFAULT_RESTART_MAX_DELAY_MS,
    DEFAULT_RESTART_MAX_RAPID_FAILURES, DEFAULT_RESTART_WINDOW_SECS,
};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    /// Delay before the first crash restart of a slot
    pub initial_delay_ms: u64,
    /// Backoff cap
    pub max_delay_ms: u64,
    /// Rapid consecutive failures before a slot stops auto-restarting (0 = never)
    pub max_rapid_failures: u32,
    /// A failure this long after the previous one resets the rapid counter
    pub window_secs: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_RESTART_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_RESTART_MAX_DELAY_MS,
            max_rapid_failures: DEFAULT_RESTART_MAX_RAPID_FAILURES,
            window_secs: DEFAULT_RESTART_WINDOW_SECS,
        }
    }
}

impl RestartConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.initial_delay_ms == 0 {
            return Err(ConfigError::restart(
                "restart.initial_delay_ms must be > 0 (the delay bounds restart storms)",
            ));
        }

        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::restart(format!(
                "restart.max_delay_ms ({}) must be >= restart.initial_delay_ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }

        Ok(())
    }
}
