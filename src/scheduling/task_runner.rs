//! In-process drain loop for the worker-queue transport
//!
//! Drains due tasks from the in-memory queue on a short cadence and hands
//! them to the dispatcher or poller. Each task is one bounded unit of work;
//! failures are recorded on the job and never abort the loop.

use chrono::Utc;
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing::{error, info};

use super::chunk_dispatcher::ChunkDispatcher;
use super::poller::SchedulePoller;
use super::task_queue::InMemoryTaskQueue;
use super::types::TaskKind;
use crate::config::SchedulingConfig;
use crate::errors::SchedulerResult;

/// Tasks drained per pass; keeps one pass bounded
const DRAIN_BATCH: usize = 8;

pub struct TaskRunner {
    queue: Arc<InMemoryTaskQueue>,
    dispatcher: Arc<ChunkDispatcher>,
    poller: Arc<SchedulePoller>,
    config: SchedulingConfig,
}

impl TaskRunner {
    pub fn new(
        queue: Arc<InMemoryTaskQueue>,
        dispatcher: Arc<ChunkDispatcher>,
        poller: Arc<SchedulePoller>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            poller,
            config,
        }
    }

    /// Run the drain loop until the cancellation token fires.
    ///
    /// Registers the recurring poll tick first, so a bare runner is a
    /// complete scheduler.
    pub async fn run(
        &self,
        cancellation_token: tokio_util::sync::CancellationToken,
    ) -> SchedulerResult<()> {
        info!("Starting task runner");
        self.poller.ensure_registered().await?;

        let mut drain = interval(Duration::from_secs(self.config.drain_interval_secs.max(1)));
        loop {
            tokio::select! {
                _ = drain.tick() => {
                    self.drain_due().await;
                }
                _ = cancellation_token.cancelled() => {
                    info!("Task runner received cancellation signal, shutting down");
                    break;
                }
            }
        }

        info!("Task runner stopped");
        Ok(())
    }

    /// Drain one bounded batch of due tasks
    pub async fn drain_due(&self) {
        for task in self.queue.take_due(Utc::now(), DRAIN_BATCH).await {
            match task.kind {
                TaskKind::ProcessChunk { job_id, offset } => {
                    if let Err(e) = self.dispatcher.run_chunk(job_id, offset).await {
                        error!("Chunk dispatch failed for job {}: {}", job_id, e);
                    }
                }
                TaskKind::PollSchedules => {
                    if let Err(e) = self.poller.tick(Utc::now()).await {
                        error!("Schedule poll tick failed: {}", e);
                    }
                }
            }
        }
    }
}
