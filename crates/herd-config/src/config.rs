use crate::{
    ConfigError, ConfigErrorResult, DrainConfig, LogLevel, LoggingConfig, PoolConfig, RestartConfig,
};

use std::path::PathBuf;
use std::str::FromStr;

use log::info;
use serde::Deserialize;

/// Resolved supervisor configuration.
///
/// The supervisor and worker harness only ever see this structure; how it
/// was produced (file, env, flags) is glue that stops here.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pool: PoolConfig,
    pub restart: RestartConfig,
    pub drain: DrainConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config.
    ///
    /// Loading order:
    /// 1. Check for HERD_CONFIG_DIR env var, else use ./.herd/
    /// 2. Load config.toml if it exists, else use defaults
    /// 3. Apply HERD_* environment variable overrides
    ///
    /// Does NOT validate - call validate() after load().
    pub fn load() -> ConfigErrorResult<Self> {
        // .env is a development convenience only
        let _ = dotenvy::dotenv();

        let config_path = Self::config_dir()?.join("config.toml");

        let mut config = if config_path.exists() {
            Self::load_toml(&config_path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load and parse TOML file with error context.
    fn load_toml(path: &PathBuf) -> ConfigErrorResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Toml {
            path: path.clone(),
            source: e,
        })
    }

    /// Get the config directory.
    /// Priority: HERD_CONFIG_DIR env var > ./.herd/ (relative to cwd)
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Ok(dir) = std::env::var("HERD_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }

        let cwd = std::env::current_dir()
            .map_err(|_| ConfigError::config("Cannot determine current working directory"))?;
        Ok(cwd.join(".herd"))
    }

    fn apply_env_overrides(&mut self) {
        env_parse("HERD_WORKERS", &mut self.pool.workers);
        env_parse("HERD_BASE_PORT", &mut self.pool.base_port);
        env_string("HERD_HOST", &mut self.pool.host);
        env_string("HERD_SERVER", &mut self.pool.server);
        env_string("HERD_TITLE", &mut self.pool.title);
        env_parse("HERD_ALLOW_FORCED_EXIT", &mut self.pool.allow_forced_exit);
        env_parse("HERD_WATCH_DEBOUNCE_MS", &mut self.pool.watch_debounce_ms);
        env_parse("HERD_READY_TIMEOUT_SECS", &mut self.pool.ready_timeout_secs);

        if let Ok(raw) = std::env::var("HERD_APP_CONFIG") {
            match serde_json::from_str(&raw) {
                Ok(value) => self.pool.app_config = value,
                Err(e) => log::warn!("Ignoring malformed HERD_APP_CONFIG: {e}"),
            }
        }

        env_parse(
            "HERD_RESTART_INITIAL_DELAY_MS",
            &mut self.restart.initial_delay_ms,
        );
        env_parse("HERD_RESTART_MAX_DELAY_MS", &mut self.restart.max_delay_ms);
        env_parse(
            "HERD_RESTART_MAX_RAPID_FAILURES",
            &mut self.restart.max_rapid_failures,
        );
        env_parse("HERD_RESTART_WINDOW_SECS", &mut self.restart.window_secs);

        env_parse("HERD_DRAIN_DEADLINE_SECS", &mut self.drain.deadline_secs);

        if let Ok(level) = std::env::var("HERD_LOG_LEVEL") {
            // FromStr never fails, unknown values fall back to Info
            self.logging.level = LogLevel::from_str(&level).unwrap();
        }
        if let Ok(file) = std::env::var("HERD_LOG_FILE") {
            self.logging.file = Some(file);
        }
        env_string("HERD_LOG_DIR", &mut self.logging.dir);
        env_parse("HERD_LOG_COLORED", &mut self.logging.colored);
    }

    /// Validate all sections.
    /// Call after load() to catch all errors at startup.
    pub fn validate(&self) -> ConfigErrorResult<()> {
        self.pool.validate()?;
        self.restart.validate()?;
        self.drain.validate()?;

        Ok(())
    }

    /// One-line startup summary for the log.
    pub fn log_summary(&self) {
        let last_port = self.pool.port_for(self.pool.workers - 1);
        info!(
            "Pool: {} workers on {}:{}-{}, server={}",
            self.pool.workers, self.pool.host, self.pool.base_port, last_port, self.pool.server
        );
        info!(
            "Restart: initial={}ms max={}ms breaker={} window={}s; drain deadline={}s",
            self.restart.initial_delay_ms,
            self.restart.max_delay_ms,
            self.restart.max_rapid_failures,
            self.restart.window_secs,
            self.drain.deadline_secs
        );
    }
}

fn env_parse<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(key)
        && let Ok(value) = raw.parse()
    {
        *target = value;
    }
}

fn env_string(key: &str, target: &mut String) {
    if let Ok(raw) = std::env::var(key) {
        *target = raw;
    }
}
