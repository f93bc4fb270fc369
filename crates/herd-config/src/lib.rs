mod config;
mod drain_config;
mod error;
mod log_level;
mod logging_config;
mod pool_config;
mod restart_config;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use drain_config::DrainConfig;
pub use error::{ConfigError, ConfigErrorResult};
pub use log_level::LogLevel;
pub use logging_config::LoggingConfig;
pub use pool_config::PoolConfig;
pub use restart_config::RestartConfig;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_BASE_PORT: u16 = 8000;
const DEFAULT_WORKERS: usize = 2;
const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 500;
const DEFAULT_READY_TIMEOUT_SECS: u64 = 0;
const DEFAULT_RESTART_INITIAL_DELAY_MS: u64 = 1_000;
const DEFAULT_RESTART_MAX_DELAY_MS: u64 = 30_000;
const DEFAULT_RESTART_MAX_RAPID_FAILURES: u32 = 5;
const DEFAULT_RESTART_WINDOW_SECS: u64 = 30;
const DEFAULT_DRAIN_DEADLINE_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL_STRING: &str = "info";
const DEFAULT_LOG_DIRECTORY: &str = "log";

const MIN_PORT: u16 = 1024;
const MAX_WORKERS: usize = 512;
