//! Default values for configuration fields

use std::path::PathBuf;

pub fn default_database_url() -> String {
    "sqlite://data/import-scheduler.db?mode=rwc".to_string()
}

pub fn default_poll_interval_secs() -> u64 {
    60
}

pub fn default_drain_interval_secs() -> u64 {
    1
}

pub fn default_chunk_delay_secs() -> u64 {
    1
}

pub fn default_lock_backoff_secs() -> u64 {
    10
}

pub fn default_stale_after_secs() -> u64 {
    300
}

pub fn default_due_page_size() -> u64 {
    5
}

pub fn default_rescue_page_size() -> u64 {
    3
}

pub fn default_batch_size() -> u32 {
    50
}

pub fn default_signal_dir() -> PathBuf {
    PathBuf::from("data/abort-signals")
}
