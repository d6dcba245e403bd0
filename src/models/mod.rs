//! Domain models for import jobs and chunk execution

use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an import job.
///
/// Only `paused` and `failed` stop the dispatcher outright; `error` marks a
/// chain that terminated on a chunk failure and needs a manual re-trigger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImportJobStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "paused")]
    Paused,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "error")]
    Error,
}

impl ImportJobStatus {
    /// States in which the dispatcher must not advance the chain.
    pub fn halts_dispatch(&self) -> bool {
        matches!(self, ImportJobStatus::Paused | ImportJobStatus::Failed)
    }
}

/// Recurrence period for scheduled re-execution. `Disabled` means manual-only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScheduleInterval {
    #[sea_orm(string_value = "disabled")]
    Disabled,
    #[sea_orm(string_value = "15min")]
    #[serde(rename = "15min")]
    #[strum(serialize = "15min")]
    Every15Min,
    #[sea_orm(string_value = "hourly")]
    Hourly,
    #[sea_orm(string_value = "6hours")]
    #[serde(rename = "6hours")]
    #[strum(serialize = "6hours")]
    Every6Hours,
    #[sea_orm(string_value = "daily")]
    Daily,
    #[sea_orm(string_value = "weekly")]
    Weekly,
    #[sea_orm(string_value = "monthly")]
    Monthly,
}

impl ScheduleInterval {
    /// Recurrence period, `None` for `Disabled`.
    pub fn period(&self) -> Option<Duration> {
        let minutes = match self {
            ScheduleInterval::Disabled => return None,
            ScheduleInterval::Every15Min => 15,
            ScheduleInterval::Hourly => 60,
            ScheduleInterval::Every6Hours => 360,
            ScheduleInterval::Daily => 1440,
            ScheduleInterval::Weekly => 10080,
            ScheduleInterval::Monthly => 43200,
        };
        Some(Duration::minutes(minutes))
    }
}

/// Which transport drives the schedule poller. Affects only how the tick is
/// invoked, never its logic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScheduleMethod {
    /// The in-process task runner drains a self-registered recurring tick.
    #[sea_orm(string_value = "worker_queue")]
    WorkerQueue,
    /// An outside transport (system cron, HTTP endpoint) calls the tick.
    #[sea_orm(string_value = "external_cron")]
    ExternalCron,
}

impl Default for ScheduleMethod {
    fn default() -> Self {
        ScheduleMethod::WorkerQueue
    }
}

/// One configured import job and its mutable run state.
///
/// Owned exclusively by the job store; components mutate it only through
/// repository operations and never cache a copy across chunk boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: Uuid,
    pub name: String,
    pub feed_url: String,
    pub status: ImportJobStatus,
    pub schedule_interval: ScheduleInterval,
    pub schedule_method: ScheduleMethod,
    /// Items per chunk; zero or negative falls back to the configured default.
    pub batch_size: i32,
    pub total_items: i64,
    pub processed_items: i64,
    /// Start of the most recent run; `None` means never run, which always
    /// counts as due.
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    /// Chunk size for this job, falling back to the process-wide default.
    pub fn effective_batch_size(&self, default_batch_size: u32) -> u64 {
        if self.batch_size > 0 {
            self.batch_size as u64
        } else {
            default_batch_size as u64
        }
    }

    /// Whether this job's recurrence period has elapsed since its last run.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let Some(period) = self.schedule_interval.period() else {
            return false;
        };
        match self.last_run_at {
            None => true,
            Some(last_run) => now - last_run >= period,
        }
    }
}

/// Request payload for creating an import job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJobCreateRequest {
    pub name: String,
    pub feed_url: String,
    pub schedule_interval: ScheduleInterval,
    #[serde(default)]
    pub schedule_method: ScheduleMethod,
    pub batch_size: Option<i32>,
}

/// Outcome of one importer invocation. Ephemeral, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    /// Items processed in this invocation.
    pub processed_in_chunk: u64,
    /// Cumulative offset to resume from; when absent the dispatcher advances
    /// by the chunk size.
    pub total_processed: Option<u64>,
    /// Feed size once the importer has discovered it.
    pub total_items: Option<u64>,
    /// No more items remain.
    pub completed: bool,
    /// Another process currently holds the job's execution lock.
    pub locked: bool,
    /// The job was cooperatively halted mid-chunk.
    pub stopped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(interval: ScheduleInterval, last_run_at: Option<DateTime<Utc>>) -> ImportJob {
        let now = Utc::now();
        ImportJob {
            id: Uuid::new_v4(),
            name: "catalog".to_string(),
            feed_url: "https://example.com/feed.csv".to_string(),
            status: ImportJobStatus::Scheduled,
            schedule_interval: interval,
            schedule_method: ScheduleMethod::WorkerQueue,
            batch_size: 0,
            total_items: 0,
            processed_items: 0,
            last_run_at,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_interval_periods() {
        assert_eq!(ScheduleInterval::Disabled.period(), None);
        assert_eq!(
            ScheduleInterval::Every15Min.period(),
            Some(Duration::minutes(15))
        );
        assert_eq!(ScheduleInterval::Hourly.period(), Some(Duration::minutes(60)));
        assert_eq!(
            ScheduleInterval::Every6Hours.period(),
            Some(Duration::minutes(360))
        );
        assert_eq!(ScheduleInterval::Daily.period(), Some(Duration::minutes(1440)));
        assert_eq!(
            ScheduleInterval::Weekly.period(),
            Some(Duration::minutes(10080))
        );
        assert_eq!(
            ScheduleInterval::Monthly.period(),
            Some(Duration::minutes(43200))
        );
    }

    #[test]
    fn test_disabled_jobs_are_never_due() {
        let now = Utc::now();
        assert!(!job(ScheduleInterval::Disabled, None).is_due(now));
        assert!(!job(ScheduleInterval::Disabled, Some(now - Duration::days(365))).is_due(now));
    }

    #[test]
    fn test_never_run_jobs_are_always_due() {
        let now = Utc::now();
        assert!(job(ScheduleInterval::Every15Min, None).is_due(now));
        assert!(job(ScheduleInterval::Monthly, None).is_due(now));
    }

    #[test]
    fn test_hourly_due_boundary() {
        let now = Utc::now();
        let not_yet = job(ScheduleInterval::Hourly, Some(now - Duration::minutes(59)));
        let exactly = job(ScheduleInterval::Hourly, Some(now - Duration::minutes(60)));
        assert!(!not_yet.is_due(now));
        assert!(exactly.is_due(now));
    }

    #[test]
    fn test_effective_batch_size_fallback() {
        let mut j = job(ScheduleInterval::Hourly, None);
        assert_eq!(j.effective_batch_size(50), 50);
        j.batch_size = -10;
        assert_eq!(j.effective_batch_size(50), 50);
        j.batch_size = 200;
        assert_eq!(j.effective_batch_size(50), 200);
    }

    #[test]
    fn test_halts_dispatch() {
        assert!(ImportJobStatus::Paused.halts_dispatch());
        assert!(ImportJobStatus::Failed.halts_dispatch());
        assert!(!ImportJobStatus::Processing.halts_dispatch());
        assert!(!ImportJobStatus::Error.halts_dispatch());
    }
}
