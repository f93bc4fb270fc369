use crate::{ConfigErrorResult, DEFAULT_DRAIN_DEADLINE_SECS};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DrainConfig {
    /// Seconds a graceful session waits before force-killing stragglers
    /// (0 = wait forever)
    pub deadline_secs: u64,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            deadline_secs: DEFAULT_DRAIN_DEADLINE_SECS,
        }
    }
}

impl DrainConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        Ok(())
    }
}
