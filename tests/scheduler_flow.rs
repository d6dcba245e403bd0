//! End-to-end scheduler tests against an in-memory SQLite database
//!
//! Exercises the full pipeline: poller tick -> rescuer -> dispatcher chain ->
//! job store updates, with a scripted importer standing in for the external
//! feed processor.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use import_scheduler::config::{DatabaseConfig, SchedulingConfig};
use import_scheduler::database::repositories::ImportJobRepository;
use import_scheduler::database::Database;
use import_scheduler::entities::{import_jobs, prelude::ImportJobs};
use import_scheduler::errors::ImporterError;
use import_scheduler::models::{
    ChunkResult, ImportJob, ImportJobCreateRequest, ImportJobStatus, ScheduleInterval,
    ScheduleMethod,
};
use import_scheduler::scheduling::{
    AbortSignalStore, ChunkDispatcher, ChunkExecutor, ChunkImporter, DispatchOutcome, FileAbortSignalStore,
    InMemoryTaskQueue, KillSwitch, SchedulePoller, StuckJobRescuer, TaskFilter, TaskKind,
    TaskQueue, QueuedTask,
};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Importer that replays a fixed script of chunk results
struct ScriptedImporter {
    script: Mutex<VecDeque<Result<ChunkResult, String>>>,
    calls: AtomicUsize,
}

impl ScriptedImporter {
    fn new(script: Vec<Result<ChunkResult, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkImporter for ScriptedImporter {
    async fn process_chunk(
        &self,
        _offset: u64,
        _limit: u64,
        _job_id: Uuid,
    ) -> Result<ChunkResult, ImporterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(ChunkResult {
                completed: true,
                ..Default::default()
            }))
            .map_err(ImporterError::new)
    }
}

fn progress(processed: u64, cumulative: u64, total: u64) -> Result<ChunkResult, String> {
    Ok(ChunkResult {
        processed_in_chunk: processed,
        total_processed: Some(cumulative),
        total_items: Some(total),
        ..Default::default()
    })
}

fn completed() -> Result<ChunkResult, String> {
    Ok(ChunkResult {
        completed: true,
        ..Default::default()
    })
}

fn locked() -> Result<ChunkResult, String> {
    Ok(ChunkResult {
        locked: true,
        ..Default::default()
    })
}

struct Harness {
    db: Database,
    jobs: ImportJobRepository,
    queue: Arc<InMemoryTaskQueue>,
    dispatcher: Arc<ChunkDispatcher>,
    poller: SchedulePoller,
    importer: Arc<ScriptedImporter>,
    signal_store: Arc<FileAbortSignalStore>,
    _signal_dir: tempfile::TempDir,
}

async fn harness(script: Vec<Result<ChunkResult, String>>) -> Result<Harness> {
    harness_with(script, SchedulingConfig::default()).await
}

async fn harness_with(
    script: Vec<Result<ChunkResult, String>>,
    config: SchedulingConfig,
) -> Result<Harness> {
    init_tracing();
    let db = Database::connect(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(5),
    })
    .await?;
    db.migrate().await?;

    let jobs = ImportJobRepository::new(db.connection().clone());
    let queue = Arc::new(InMemoryTaskQueue::new());
    let signal_dir = tempfile::tempdir()?;
    let signal_store = Arc::new(FileAbortSignalStore::new(signal_dir.path()));
    let importer = Arc::new(ScriptedImporter::new(script));

    let executor = ChunkExecutor::new(importer.clone(), config.default_batch_size);
    let dispatcher = Arc::new(ChunkDispatcher::new(
        jobs.clone(),
        executor,
        KillSwitch::new(signal_store.clone()),
        queue.clone(),
        config.clone(),
    ));
    let rescuer = StuckJobRescuer::new(jobs.clone(), queue.clone(), config.clone());
    let poller = SchedulePoller::new(
        jobs.clone(),
        rescuer,
        dispatcher.clone(),
        queue.clone(),
        config,
    );

    Ok(Harness {
        db,
        jobs,
        queue,
        dispatcher,
        poller,
        importer,
        signal_store,
        _signal_dir: signal_dir,
    })
}

impl Harness {
    async fn create_job(&self, interval: ScheduleInterval, batch_size: i32) -> Result<ImportJob> {
        Ok(self
            .jobs
            .create(ImportJobCreateRequest {
                name: "catalog feed".to_string(),
                feed_url: "https://example.com/products.csv".to_string(),
                schedule_interval: interval,
                schedule_method: ScheduleMethod::WorkerQueue,
                batch_size: Some(batch_size),
            })
            .await?)
    }

    /// Drain the queue to completion, treating all enqueue delays as elapsed
    async fn drain_chain(&self) -> Result<usize> {
        let mut dispatched = 0;
        for _ in 0..50 {
            let due = self
                .queue
                .take_due(Utc::now() + Duration::seconds(30), 8)
                .await;
            if due.is_empty() {
                break;
            }
            for task in due {
                if let TaskKind::ProcessChunk { job_id, offset } = task.kind {
                    self.dispatcher.run_chunk(job_id, offset).await?;
                    dispatched += 1;
                }
            }
        }
        Ok(dispatched)
    }

    async fn reload(&self, id: &Uuid) -> Result<ImportJob> {
        Ok(self.jobs.find_by_id(id).await?.expect("job exists"))
    }
}

#[tokio::test]
async fn test_scheduled_run_completes_in_chunks() -> Result<()> {
    let h = harness(vec![
        progress(50, 50, 120),
        progress(50, 100, 120),
        progress(20, 120, 120),
        completed(),
    ])
    .await?;
    let job = h.create_job(ScheduleInterval::Hourly, 50).await?;

    let summary = h.poller.tick(Utc::now()).await?;
    assert_eq!(summary.started, 1);
    assert_eq!(summary.rescued, 0);

    let started = h.reload(&job.id).await?;
    assert_eq!(started.status, ImportJobStatus::Processing);
    assert!(started.last_run_at.is_some());
    assert_eq!(started.processed_items, 0);

    let dispatched = h.drain_chain().await?;
    assert_eq!(dispatched, 4);
    assert_eq!(h.importer.calls(), 4);

    let finished = h.reload(&job.id).await?;
    assert_eq!(finished.status, ImportJobStatus::Completed);
    assert_eq!(finished.processed_items, 120);
    assert_eq!(finished.total_items, 120);

    // Freshly run: the next tick must not select it again
    let again = h.poller.tick(Utc::now()).await?;
    assert_eq!(again.started, 0);
    Ok(())
}

#[tokio::test]
async fn test_locked_chunk_backs_off_at_same_offset() -> Result<()> {
    let h = harness(vec![progress(50, 50, 100), locked(), completed()]).await?;
    let job = h.create_job(ScheduleInterval::Daily, 50).await?;

    h.poller.tick(Utc::now()).await?;

    // First chunk makes progress, second hits the lock
    for _ in 0..2 {
        let due = h
            .queue
            .take_due(Utc::now() + Duration::seconds(30), 8)
            .await;
        assert_eq!(due.len(), 1);
        if let TaskKind::ProcessChunk { job_id, offset } = due[0].kind {
            h.dispatcher.run_chunk(job_id, offset).await?;
        }
    }

    // The same offset is pending again, held back by the lock backoff
    assert!(h
        .queue
        .has_pending(&TaskFilter::chunk_at(job.id, 50))
        .await?);
    let mid_run = h.reload(&job.id).await?;
    assert_eq!(mid_run.status, ImportJobStatus::Processing);
    assert_eq!(mid_run.processed_items, 50);

    h.drain_chain().await?;
    assert_eq!(h.reload(&job.id).await?.status, ImportJobStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_paused_job_is_never_advanced() -> Result<()> {
    let h = harness(vec![completed()]).await?;
    let job = h.create_job(ScheduleInterval::Hourly, 50).await?;
    h.jobs
        .update_status(&job.id, ImportJobStatus::Paused)
        .await?;

    let outcome = h.dispatcher.run_chunk(job.id, 0).await?;
    assert_eq!(outcome, DispatchOutcome::Halted);
    assert_eq!(h.importer.calls(), 0);
    assert_eq!(h.queue.pending_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_missing_job_terminates_silently() -> Result<()> {
    let h = harness(vec![]).await?;
    let outcome = h.dispatcher.run_chunk(Uuid::new_v4(), 0).await?;
    assert_eq!(outcome, DispatchOutcome::MissingJob);
    assert_eq!(h.importer.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_kill_switch_aborts_before_execution() -> Result<()> {
    let h = harness(vec![completed()]).await?;
    let job = h.create_job(ScheduleInterval::Hourly, 50).await?;

    h.signal_store.raise_job_signal(job.id).await?;
    let outcome = h.dispatcher.run_chunk(job.id, 0).await?;

    assert_eq!(outcome, DispatchOutcome::Killed);
    // Zero importer calls: a killed job never executes one more chunk
    assert_eq!(h.importer.calls(), 0);
    // Marker was consumed, status left as it was
    assert!(!h.signal_store.consume_job_signal(job.id).await?);
    assert_eq!(h.reload(&job.id).await?.status, ImportJobStatus::Scheduled);

    // With the marker gone the chain runs normally again
    let outcome = h.dispatcher.run_chunk(job.id, 0).await?;
    assert_eq!(outcome, DispatchOutcome::Finished);
    Ok(())
}

#[tokio::test]
async fn test_failed_chunk_sets_error_and_stops_chain() -> Result<()> {
    let h = harness(vec![
        progress(50, 50, 100),
        Err("feed returned HTTP 500".to_string()),
    ])
    .await?;
    let job = h.create_job(ScheduleInterval::Hourly, 50).await?;

    h.poller.tick(Utc::now()).await?;
    h.drain_chain().await?;

    let failed = h.reload(&job.id).await?;
    assert_eq!(failed.status, ImportJobStatus::Error);
    assert!(failed.last_error.as_deref().unwrap().contains("HTTP 500"));
    // No automatic retry: nothing further is enqueued
    assert_eq!(h.queue.pending_count().await, 0);
    assert_eq!(h.importer.calls(), 2);
    Ok(())
}

/// Backdate a job into a stale mid-run state, as a crashed worker would
/// leave it
async fn make_stuck(h: &Harness, id: &Uuid, processed: i64, total: i64) -> Result<()> {
    let stale = Utc::now() - Duration::minutes(10);
    ImportJobs::update_many()
        .col_expr(
            import_jobs::Column::Status,
            Expr::value(ImportJobStatus::Processing),
        )
        .col_expr(import_jobs::Column::ProcessedItems, Expr::value(processed))
        .col_expr(import_jobs::Column::TotalItems, Expr::value(total))
        .col_expr(import_jobs::Column::UpdatedAt, Expr::value(stale))
        .filter(import_jobs::Column::Id.eq(*id))
        .exec(h.db.connection().as_ref())
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_stuck_job_is_rescued_from_last_offset() -> Result<()> {
    let h = harness(vec![completed()]).await?;
    let job = h.create_job(ScheduleInterval::Disabled, 50).await?;
    make_stuck(&h, &job.id, 40, 200).await?;

    let now = Utc::now();
    let summary = h.poller.tick(now).await?;
    assert_eq!(summary.rescued, 1);

    // Chain restarts at the last durable offset
    assert!(h
        .queue
        .has_pending(&TaskFilter::chunk_at(job.id, 40))
        .await?);
    let rescued = h.reload(&job.id).await?;
    assert_eq!(rescued.status, ImportJobStatus::Processing);
    assert!(rescued.updated_at >= now - Duration::seconds(5));
    Ok(())
}

#[tokio::test]
async fn test_rescuer_skips_job_with_pending_continuation() -> Result<()> {
    let h = harness(vec![]).await?;
    let job = h.create_job(ScheduleInterval::Disabled, 50).await?;
    make_stuck(&h, &job.id, 40, 200).await?;

    // A continuation is still pending: slow, not stuck
    h.queue
        .enqueue_once(QueuedTask::delayed(
            TaskKind::ProcessChunk {
                job_id: job.id,
                offset: 40,
            },
            Utc::now() + Duration::seconds(30),
        ))
        .await?;

    let summary = h.poller.tick(Utc::now()).await?;
    assert_eq!(summary.rescued, 0);
    assert_eq!(h.queue.pending_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_disabled_jobs_are_never_scheduled() -> Result<()> {
    let h = harness(vec![]).await?;
    h.create_job(ScheduleInterval::Disabled, 50).await?;

    let summary = h.poller.tick(Utc::now()).await?;
    assert_eq!(summary.started, 0);
    assert_eq!(h.queue.pending_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_due_check_respects_interval_arithmetic() -> Result<()> {
    let h = harness(vec![]).await?;
    let job = h.create_job(ScheduleInterval::Hourly, 50).await?;

    // Ran 59 minutes ago: not due
    let recent = Utc::now() - Duration::minutes(59);
    ImportJobs::update_many()
        .col_expr(import_jobs::Column::LastRunAt, Expr::value(Some(recent)))
        .col_expr(
            import_jobs::Column::Status,
            Expr::value(ImportJobStatus::Completed),
        )
        .filter(import_jobs::Column::Id.eq(job.id))
        .exec(h.db.connection().as_ref())
        .await?;

    let due = h.jobs.find_due_recurring(Utc::now(), 5).await?;
    assert!(due.is_empty());

    // At the full hour it becomes due
    let due = h
        .jobs
        .find_due_recurring(Utc::now() + Duration::minutes(1), 5)
        .await?;
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, job.id);
    Ok(())
}

#[tokio::test]
async fn test_due_at_exact_interval_boundary() -> Result<()> {
    let h = harness(vec![]).await?;
    let job = h.create_job(ScheduleInterval::Every15Min, 50).await?;
    let now = Utc::now();

    ImportJobs::update_many()
        .col_expr(
            import_jobs::Column::LastRunAt,
            Expr::value(Some(now - Duration::minutes(15))),
        )
        .col_expr(
            import_jobs::Column::Status,
            Expr::value(ImportJobStatus::Completed),
        )
        .filter(import_jobs::Column::Id.eq(job.id))
        .exec(h.db.connection().as_ref())
        .await?;

    // Exactly one full interval elapsed counts as due
    let due = h.jobs.find_due_recurring(now, 5).await?;
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, job.id);
    Ok(())
}

#[tokio::test]
async fn test_progress_is_clamped_to_known_total() -> Result<()> {
    let h = harness(vec![]).await?;
    let job = h.create_job(ScheduleInterval::Hourly, 50).await?;

    // Importer over-reports past the known feed size
    h.jobs.record_progress(&job.id, 250, Some(200)).await?;
    let clamped = h.reload(&job.id).await?;
    assert_eq!(clamped.processed_items, 200);
    assert_eq!(clamped.total_items, 200);

    // Without a known total the raw count is stored as-is
    h.jobs.record_progress(&job.id, 250, None).await?;
    assert_eq!(h.reload(&job.id).await?.processed_items, 250);
    Ok(())
}

#[tokio::test]
async fn test_mark_started_claims_atomically() -> Result<()> {
    let h = harness(vec![]).await?;
    let job = h.create_job(ScheduleInterval::Hourly, 50).await?;
    let now = Utc::now();

    // First claim wins, second loses: the job is already processing
    assert!(h.jobs.mark_started(&job.id, now).await?);
    assert!(!h.jobs.mark_started(&job.id, now).await?);

    let claimed = h.reload(&job.id).await?;
    assert_eq!(claimed.status, ImportJobStatus::Processing);
    assert_eq!(claimed.processed_items, 0);
    assert_eq!(claimed.last_run_at, Some(now));
    Ok(())
}

#[tokio::test]
async fn test_trigger_and_cancel_import() -> Result<()> {
    let h = harness(vec![]).await?;
    let job = h.create_job(ScheduleInterval::Disabled, 50).await?;

    // Manual trigger works independently of schedule due-ness
    h.poller.trigger_import(job.id).await?;
    let triggered = h.reload(&job.id).await?;
    assert_eq!(triggered.status, ImportJobStatus::Processing);
    assert!(triggered.last_run_at.is_some());
    assert!(h
        .queue
        .has_pending(&TaskFilter::chunk_at(job.id, 0))
        .await?);

    // Cancel removes the pending chain without touching job status
    let cancelled = h.poller.cancel_import(job.id).await?;
    assert_eq!(cancelled, 1);
    assert_eq!(h.queue.pending_count().await, 0);
    assert_eq!(h.reload(&job.id).await?.status, ImportJobStatus::Processing);

    // Unknown jobs surface an error
    assert!(h.poller.trigger_import(Uuid::new_v4()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_poller_self_registration_is_idempotent() -> Result<()> {
    let h = harness(vec![]).await?;

    assert!(h.poller.ensure_registered().await?);
    assert!(!h.poller.ensure_registered().await?);
    assert_eq!(h.queue.pending_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_external_cron_method_skips_self_registration() -> Result<()> {
    let config = SchedulingConfig {
        schedule_method: ScheduleMethod::ExternalCron,
        ..Default::default()
    };
    let h = harness_with(vec![], config).await?;

    assert!(!h.poller.ensure_registered().await?);
    assert_eq!(h.queue.pending_count().await, 0);
    Ok(())
}
