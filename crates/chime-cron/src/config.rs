use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CronError, Result};

/// Cadence at which an installed distributed lock is re-acquired.
pub const DEFAULT_LOCK_REFRESH_SECS: u64 = 60;

/// Scheduler configuration (TOML file + CHIME_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronConfig {
    /// Seconds between distributed-lock refresh attempts.
    /// Override with env var: CHIME_LOCK_REFRESH_SECS=30
    #[serde(default = "default_lock_refresh_secs")]
    pub lock_refresh_secs: u64,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            lock_refresh_secs: DEFAULT_LOCK_REFRESH_SECS,
        }
    }
}

fn default_lock_refresh_secs() -> u64 {
    DEFAULT_LOCK_REFRESH_SECS
}

impl CronConfig {
    /// Load config from an optional TOML file with CHIME_* env var overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed("CHIME_"))
            .extract()
            .map_err(|e| CronError::Config(e.to_string()))
    }
}
