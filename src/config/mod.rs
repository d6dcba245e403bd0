//! Configuration loading and validation
//!
//! Layered via figment: built-in defaults, then an optional TOML file, then
//! `IMPORT_SCHEDULER_*` environment variables (double underscore separating
//! section from key, e.g. `IMPORT_SCHEDULER_SCHEDULING__POLL_INTERVAL_SECS`).

use chrono::Duration;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{SchedulerError, SchedulerResult};
use crate::models::ScheduleMethod;

pub mod defaults;

use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub abort_signals: AbortSignalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    pub max_connections: Option<u32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: None,
        }
    }
}

/// Tuning knobs for the chunk dispatch loop, rescuer, and poller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Cadence of the due-schedule poller tick
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Cadence of the in-process task runner's drain loop
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,
    /// Delay between chunks of one chain, yielding the scheduler
    #[serde(default = "default_chunk_delay_secs")]
    pub chunk_delay_secs: u64,
    /// Backoff before retrying the same offset on lock contention
    #[serde(default = "default_lock_backoff_secs")]
    pub lock_backoff_secs: u64,
    /// Age of `updated_at` beyond which a mid-run job counts as stuck
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// Maximum due jobs started per poller tick
    #[serde(default = "default_due_page_size")]
    pub due_page_size: u64,
    /// Maximum stuck jobs rescued per poller tick
    #[serde(default = "default_rescue_page_size")]
    pub rescue_page_size: u64,
    /// Chunk size for jobs without a positive batch_size of their own
    #[serde(default = "default_batch_size")]
    pub default_batch_size: u32,
    /// Transport that drives the poller tick
    #[serde(default)]
    pub schedule_method: ScheduleMethod,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            drain_interval_secs: default_drain_interval_secs(),
            chunk_delay_secs: default_chunk_delay_secs(),
            lock_backoff_secs: default_lock_backoff_secs(),
            stale_after_secs: default_stale_after_secs(),
            due_page_size: default_due_page_size(),
            rescue_page_size: default_rescue_page_size(),
            default_batch_size: default_batch_size(),
            schedule_method: ScheduleMethod::default(),
        }
    }
}

impl SchedulingConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::seconds(self.chunk_delay_secs as i64)
    }

    pub fn lock_backoff(&self) -> Duration {
        Duration::seconds(self.lock_backoff_secs as i64)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::seconds(self.stale_after_secs as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortSignalConfig {
    /// Directory holding kill-switch marker files
    #[serde(default = "default_signal_dir")]
    pub signal_dir: PathBuf,
}

impl Default for AbortSignalConfig {
    fn default() -> Self {
        Self {
            signal_dir: default_signal_dir(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional TOML file, and the
    /// environment
    pub fn load(path: Option<&Path>) -> SchedulerResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed("IMPORT_SCHEDULER_").split("__"))
            .extract()
            .map_err(|e| SchedulerError::Configuration {
                message: e.to_string(),
            })
    }
}
