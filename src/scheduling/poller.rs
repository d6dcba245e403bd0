//! Due-schedule poller and administrative operations
//!
//! An explicitly constructed service, no global state: each tick rescues
//! stuck jobs first, then starts a fresh chain for every recurring job whose
//! interval has elapsed. The tick itself is driven either by the in-process
//! task runner (worker-queue method, via idempotent self-registration) or by
//! an outside transport calling `tick` directly.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info};
use uuid::Uuid;

use super::chunk_dispatcher::ChunkDispatcher;
use super::rescuer::StuckJobRescuer;
use super::task_queue::TaskQueue;
use super::types::{QueuedTask, TaskFilter, TaskKind};
use crate::config::SchedulingConfig;
use crate::database::repositories::ImportJobRepository;
use crate::errors::{RepositoryError, SchedulerResult};
use crate::models::ScheduleMethod;

/// What one poller tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub rescued: usize,
    pub started: usize,
}

pub struct SchedulePoller {
    jobs: ImportJobRepository,
    rescuer: StuckJobRescuer,
    dispatcher: Arc<ChunkDispatcher>,
    queue: Arc<dyn TaskQueue>,
    config: SchedulingConfig,
}

impl SchedulePoller {
    pub fn new(
        jobs: ImportJobRepository,
        rescuer: StuckJobRescuer,
        dispatcher: Arc<ChunkDispatcher>,
        queue: Arc<dyn TaskQueue>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            jobs,
            rescuer,
            dispatcher,
            queue,
            config,
        }
    }

    /// Register the recurring tick with the queue, once.
    ///
    /// Only the worker-queue method self-registers; with the external-cron
    /// method an outside transport owns the cadence and this is a no-op.
    /// Returns whether a registration was created.
    pub async fn ensure_registered(&self) -> SchedulerResult<bool> {
        if self.config.schedule_method != ScheduleMethod::WorkerQueue {
            debug!("External scheduling method configured, skipping tick registration");
            return Ok(false);
        }
        let registered = self
            .queue
            .enqueue_recurring(
                TaskKind::PollSchedules,
                Utc::now(),
                StdDuration::from_secs(self.config.poll_interval_secs),
            )
            .await?;
        if registered {
            info!(
                "Registered recurring schedule poll every {}s",
                self.config.poll_interval_secs
            );
        }
        Ok(registered)
    }

    /// One poller tick: rescue stuck jobs, then start chains for due jobs.
    pub async fn tick(&self, now: DateTime<Utc>) -> SchedulerResult<PollSummary> {
        let rescued = self.rescuer.rescue(now).await?;

        let due = self
            .jobs
            .find_due_recurring(now, self.config.due_page_size)
            .await?;

        let mut started = 0;
        for job in due {
            // Best-effort guard; the atomic claim in start_fresh_run is what
            // actually prevents a double start
            if self
                .queue
                .has_pending(&TaskFilter::chunks_for(job.id))
                .await?
            {
                debug!("Job {} already has a chain in flight, skipping", job.id);
                continue;
            }

            if self.dispatcher.start_fresh_run(&job, now).await? {
                info!("Started scheduled import run for job {} ({})", job.id, job.name);
                started += 1;
            }
        }

        if rescued > 0 || started > 0 {
            info!("Poller tick: rescued {}, started {}", rescued, started);
        }
        Ok(PollSummary { rescued, started })
    }

    /// Force a job into a fresh run immediately, independent of due-ness.
    /// Pending continuations for the job are cancelled first.
    pub async fn trigger_import(&self, job_id: Uuid) -> SchedulerResult<()> {
        let now = Utc::now();
        self.queue
            .cancel_all(&TaskFilter::chunks_for(job_id))
            .await?;

        if !self.jobs.mark_triggered(&job_id, now).await? {
            return Err(RepositoryError::NotFound { id: job_id }.into());
        }

        self.queue
            .enqueue_once(QueuedTask::new(TaskKind::ProcessChunk { job_id, offset: 0 }))
            .await?;
        info!("Manually triggered import run for job {}", job_id);
        Ok(())
    }

    /// Remove all pending queue entries for a job. Job status is a separate
    /// concern and is not touched here.
    pub async fn cancel_import(&self, job_id: Uuid) -> SchedulerResult<usize> {
        let cancelled = self
            .queue
            .cancel_all(&TaskFilter::chunks_for(job_id))
            .await?;
        info!(
            "Cancelled {} pending tasks for import job {}",
            cancelled, job_id
        );
        Ok(cancelled)
    }
}
