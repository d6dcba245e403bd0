//! Stuck-job detection and rescue
//!
//! A worker crash can leave a job recorded as mid-run with no surviving
//! continuation in the queue. The rescuer finds such jobs and restarts their
//! chain from the last durable offset. A job with a pending continuation is
//! merely slow, not stuck, and is skipped.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use super::task_queue::TaskQueue;
use super::types::{QueuedTask, TaskFilter, TaskKind};
use crate::config::SchedulingConfig;
use crate::database::repositories::ImportJobRepository;
use crate::errors::SchedulerResult;

pub struct StuckJobRescuer {
    jobs: ImportJobRepository,
    queue: Arc<dyn TaskQueue>,
    config: SchedulingConfig,
}

impl StuckJobRescuer {
    pub fn new(
        jobs: ImportJobRepository,
        queue: Arc<dyn TaskQueue>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            jobs,
            queue,
            config,
        }
    }

    /// Scan one bounded page of stale mid-run jobs and restart their chains.
    /// Returns the number of jobs rescued.
    pub async fn rescue(&self, now: DateTime<Utc>) -> SchedulerResult<usize> {
        let stuck = self
            .jobs
            .find_stuck(now, self.config.stale_after(), self.config.rescue_page_size)
            .await?;

        let mut rescued = 0;
        for job in stuck {
            if self
                .queue
                .has_pending(&TaskFilter::chunks_for(job.id))
                .await?
            {
                debug!(
                    "Job {} has a pending continuation, slow but not stuck",
                    job.id
                );
                continue;
            }

            let offset = job.processed_items.max(0) as u64;
            self.jobs.mark_rescued(&job.id, now).await?;
            self.queue
                .enqueue_once(QueuedTask::new(TaskKind::ProcessChunk {
                    job_id: job.id,
                    offset,
                }))
                .await?;
            warn!(
                "Rescued stuck job {} ({}), restarting chain at offset {}",
                job.id, job.name, offset
            );
            rescued += 1;
        }

        Ok(rescued)
    }
}
