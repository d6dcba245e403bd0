//! Self-chaining chunk dispatch loop
//!
//! Each invocation processes at most one chunk and returns quickly; the
//! chain continues through a durable re-enqueue, never an in-process timer.
//! All run state lives in the job store and the work queue, which is what
//! makes a chain survive process restarts.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::chunk_executor::{ChunkExecutor, ChunkOutcome};
use super::kill_switch::KillSwitch;
use super::task_queue::TaskQueue;
use super::types::{QueuedTask, TaskKind};
use crate::config::SchedulingConfig;
use crate::database::repositories::ImportJobRepository;
use crate::errors::SchedulerResult;
use crate::models::ImportJob;

/// How one dispatcher invocation ended
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Job no longer exists; chain ends silently
    MissingJob,
    /// Job is paused/failed, or was cooperatively stopped mid-chunk
    Halted,
    /// A kill signal was consumed before execution; status left untouched
    Killed,
    /// The import completed; status set to `completed`
    Finished,
    /// Lock contention; the same offset was re-enqueued after a backoff
    Backoff,
    /// Normal progress; the next chunk was enqueued
    Continued,
    /// The importer failed; status set to `error`, no retry
    Errored,
}

/// The control loop driving one import chain, one chunk per invocation
pub struct ChunkDispatcher {
    jobs: ImportJobRepository,
    executor: ChunkExecutor,
    kill_switch: KillSwitch,
    queue: Arc<dyn TaskQueue>,
    config: SchedulingConfig,
}

impl ChunkDispatcher {
    pub fn new(
        jobs: ImportJobRepository,
        executor: ChunkExecutor,
        kill_switch: KillSwitch,
        queue: Arc<dyn TaskQueue>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            jobs,
            executor,
            kill_switch,
            queue,
            config,
        }
    }

    /// Run one chunk of the chain for `job_id` at `offset`.
    ///
    /// Entry preconditions are re-checked on every invocation against the
    /// current job record; the kill switch is consulted strictly before the
    /// importer runs, so a killed job never executes one more chunk.
    pub async fn run_chunk(&self, job_id: Uuid, offset: u64) -> SchedulerResult<DispatchOutcome> {
        let Some(job) = self.jobs.find_by_id(&job_id).await? else {
            debug!("Job {} no longer exists, ending chain", job_id);
            return Ok(DispatchOutcome::MissingJob);
        };

        if job.status.halts_dispatch() {
            debug!(
                "Job {} is {}, leaving chain untouched",
                job_id, job.status
            );
            return Ok(DispatchOutcome::Halted);
        }

        if self.kill_switch.should_abort(job_id).await? {
            info!("Abort signal consumed for job {}, ending chain", job_id);
            return Ok(DispatchOutcome::Killed);
        }

        match self.executor.execute(&job, offset).await {
            ChunkOutcome::Completed => {
                self.jobs
                    .update_status(&job_id, crate::models::ImportJobStatus::Completed)
                    .await?;
                info!("Import job {} completed", job_id);
                Ok(DispatchOutcome::Finished)
            }
            ChunkOutcome::Locked => {
                // Another executor holds this job; retry the same offset
                // rather than racing ahead over the same range
                let retry_at = Utc::now() + self.config.lock_backoff();
                self.queue
                    .enqueue_once(QueuedTask::delayed(
                        TaskKind::ProcessChunk { job_id, offset },
                        retry_at,
                    ))
                    .await?;
                debug!(
                    "Job {} locked at offset {}, retrying after backoff",
                    job_id, offset
                );
                Ok(DispatchOutcome::Backoff)
            }
            ChunkOutcome::Stopped => {
                debug!("Job {} stopped cooperatively mid-chunk", job_id);
                Ok(DispatchOutcome::Halted)
            }
            ChunkOutcome::Progress {
                next_offset,
                processed_in_chunk,
                total_items,
            } => {
                let known_total = total_items.or_else(|| {
                    (job.total_items > 0).then_some(job.total_items as u64)
                });
                self.jobs
                    .record_progress(&job_id, next_offset, known_total)
                    .await?;

                let next_at = Utc::now() + self.config.chunk_delay();
                self.queue
                    .enqueue_once(QueuedTask::delayed(
                        TaskKind::ProcessChunk {
                            job_id,
                            offset: next_offset,
                        },
                        next_at,
                    ))
                    .await?;
                debug!(
                    "Job {} processed {} items, next chunk at offset {}",
                    job_id, processed_in_chunk, next_offset
                );
                Ok(DispatchOutcome::Continued)
            }
            ChunkOutcome::Failed { message } => {
                // Deliberate fail-fast: a failing chunk is never retried
                // automatically, the operator must re-trigger
                self.jobs.set_error(&job_id, &message).await?;
                error!("Import job {} failed: {}", job_id, message);
                Ok(DispatchOutcome::Errored)
            }
        }
    }

    /// Begin a fresh run for a due job: claim it atomically, then enqueue the
    /// first chunk. Returns `false` when the claim was lost (wrong state or a
    /// concurrent tick won), in which case nothing is enqueued.
    pub async fn start_fresh_run(
        &self,
        job: &ImportJob,
        now: chrono::DateTime<Utc>,
    ) -> SchedulerResult<bool> {
        if !self.jobs.mark_started(&job.id, now).await? {
            warn!(
                "Job {} was not claimable for a fresh run (status: {})",
                job.id, job.status
            );
            return Ok(false);
        }

        self.queue
            .enqueue_once(QueuedTask::new(TaskKind::ProcessChunk {
                job_id: job.id,
                offset: 0,
            }))
            .await?;
        Ok(true)
    }
}
