//! SeaORM-based ImportJob repository
//!
//! The job store is the single source of truth for run state. Every mutation
//! is a scoped update of only the fields owed by the mutating component and
//! always touches `updated_at`; nothing here overwrites a full row.

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{import_jobs, prelude::ImportJobs};
use crate::errors::RepositoryResult;
use crate::models::{ImportJob, ImportJobCreateRequest, ImportJobStatus, ScheduleInterval};

/// SeaORM-based repository for import job records
#[derive(Clone)]
pub struct ImportJobRepository {
    connection: Arc<DatabaseConnection>,
}

impl ImportJobRepository {
    /// Create a new repository instance
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Create a new import job in `scheduled` state
    pub async fn create(&self, request: ImportJobCreateRequest) -> RepositoryResult<ImportJob> {
        let now = Utc::now();

        let active_model = import_jobs::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            feed_url: Set(request.feed_url),
            status: Set(ImportJobStatus::Scheduled),
            schedule_interval: Set(request.schedule_interval),
            schedule_method: Set(request.schedule_method),
            batch_size: Set(request.batch_size.unwrap_or(0)),
            total_items: Set(0),
            processed_items: Set(0),
            last_run_at: Set(None),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&*self.connection).await?;
        Ok(to_domain(model))
    }

    /// Find an import job by ID
    pub async fn find_by_id(&self, id: &Uuid) -> RepositoryResult<Option<ImportJob>> {
        let model = ImportJobs::find_by_id(*id).one(&*self.connection).await?;
        Ok(model.map(to_domain))
    }

    /// Set the job status, touching `updated_at`
    pub async fn update_status(
        &self,
        id: &Uuid,
        status: ImportJobStatus,
    ) -> RepositoryResult<()> {
        ImportJobs::update_many()
            .col_expr(import_jobs::Column::Status, Expr::value(status))
            .col_expr(import_jobs::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(import_jobs::Column::Id.eq(*id))
            .exec(&*self.connection)
            .await?;
        Ok(())
    }

    /// Record chunk progress, clamping `processed_items` to the known total
    pub async fn record_progress(
        &self,
        id: &Uuid,
        processed_items: u64,
        total_items: Option<u64>,
    ) -> RepositoryResult<()> {
        let processed = match total_items {
            Some(total) => processed_items.min(total) as i64,
            None => processed_items as i64,
        };

        let mut update = ImportJobs::update_many()
            .col_expr(import_jobs::Column::ProcessedItems, Expr::value(processed))
            .col_expr(import_jobs::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(total) = total_items {
            update = update.col_expr(import_jobs::Column::TotalItems, Expr::value(total as i64));
        }

        update
            .filter(import_jobs::Column::Id.eq(*id))
            .exec(&*self.connection)
            .await?;
        Ok(())
    }

    /// Atomically claim a job for a fresh scheduled run.
    ///
    /// The conditional status filter makes the transition itself the guard
    /// against two pollers starting the same chain: only the caller whose
    /// UPDATE matched a row may enqueue the first chunk.
    pub async fn mark_started(&self, id: &Uuid, now: DateTime<Utc>) -> RepositoryResult<bool> {
        let result = ImportJobs::update_many()
            .col_expr(
                import_jobs::Column::Status,
                Expr::value(ImportJobStatus::Processing),
            )
            .col_expr(import_jobs::Column::ProcessedItems, Expr::value(0i64))
            .col_expr(import_jobs::Column::LastRunAt, Expr::value(now))
            .col_expr(import_jobs::Column::LastError, Expr::value(None::<String>))
            .col_expr(import_jobs::Column::UpdatedAt, Expr::value(now))
            .filter(import_jobs::Column::Id.eq(*id))
            .filter(import_jobs::Column::Status.is_in([
                ImportJobStatus::Scheduled,
                ImportJobStatus::Completed,
            ]))
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Force a job into a fresh run regardless of its current status.
    /// Used by the manual trigger operation.
    pub async fn mark_triggered(&self, id: &Uuid, now: DateTime<Utc>) -> RepositoryResult<bool> {
        let result = ImportJobs::update_many()
            .col_expr(
                import_jobs::Column::Status,
                Expr::value(ImportJobStatus::Processing),
            )
            .col_expr(import_jobs::Column::ProcessedItems, Expr::value(0i64))
            .col_expr(import_jobs::Column::LastRunAt, Expr::value(now))
            .col_expr(import_jobs::Column::LastError, Expr::value(None::<String>))
            .col_expr(import_jobs::Column::UpdatedAt, Expr::value(now))
            .filter(import_jobs::Column::Id.eq(*id))
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Re-assert `processing` and refresh staleness for a rescued job
    pub async fn mark_rescued(&self, id: &Uuid, now: DateTime<Utc>) -> RepositoryResult<()> {
        ImportJobs::update_many()
            .col_expr(
                import_jobs::Column::Status,
                Expr::value(ImportJobStatus::Processing),
            )
            .col_expr(import_jobs::Column::UpdatedAt, Expr::value(now))
            .filter(import_jobs::Column::Id.eq(*id))
            .exec(&*self.connection)
            .await?;
        Ok(())
    }

    /// Record a chunk failure: status `error` plus the failure message
    pub async fn set_error(&self, id: &Uuid, message: &str) -> RepositoryResult<()> {
        ImportJobs::update_many()
            .col_expr(
                import_jobs::Column::Status,
                Expr::value(ImportJobStatus::Error),
            )
            .col_expr(
                import_jobs::Column::LastError,
                Expr::value(Some(message.to_string())),
            )
            .col_expr(import_jobs::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(import_jobs::Column::Id.eq(*id))
            .exec(&*self.connection)
            .await?;
        Ok(())
    }

    /// Recurring jobs whose interval has elapsed (or which never ran),
    /// bounded to `limit` per call to avoid overload.
    ///
    /// Interval arithmetic differs per row, so SQL narrows candidates by
    /// status, recurrence, and the shortest possible interval; the per-row
    /// elapsed-time check happens here. The candidate page is oversized
    /// relative to `limit` since rows passing the coarse cutoff may still not
    /// be due for their own interval.
    pub async fn find_due_recurring(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> RepositoryResult<Vec<ImportJob>> {
        let coarse_cutoff = now - Duration::minutes(15);

        let candidates = ImportJobs::find()
            .filter(import_jobs::Column::Status.is_in([
                ImportJobStatus::Scheduled,
                ImportJobStatus::Completed,
            ]))
            .filter(import_jobs::Column::ScheduleInterval.ne(ScheduleInterval::Disabled))
            .filter(
                Condition::any()
                    .add(import_jobs::Column::LastRunAt.is_null())
                    .add(import_jobs::Column::LastRunAt.lte(coarse_cutoff)),
            )
            .order_by_asc(import_jobs::Column::LastRunAt)
            .limit(limit.saturating_mul(4))
            .all(&*self.connection)
            .await?;

        Ok(candidates
            .into_iter()
            .map(to_domain)
            .filter(|job| job.is_due(now))
            .take(limit as usize)
            .collect())
    }

    /// Jobs recorded as mid-run but stale beyond `stale_after`, bounded to a
    /// small page per scan.
    pub async fn find_stuck(
        &self,
        now: DateTime<Utc>,
        stale_after: Duration,
        limit: u64,
    ) -> RepositoryResult<Vec<ImportJob>> {
        let cutoff = now - stale_after;

        let models = ImportJobs::find()
            .filter(import_jobs::Column::Status.is_in([
                ImportJobStatus::Processing,
                ImportJobStatus::Pending,
            ]))
            .filter(import_jobs::Column::TotalItems.gt(0))
            .filter(
                Expr::col(import_jobs::Column::ProcessedItems)
                    .lt(Expr::col(import_jobs::Column::TotalItems)),
            )
            .filter(import_jobs::Column::UpdatedAt.lt(cutoff))
            .order_by_asc(import_jobs::Column::UpdatedAt)
            .limit(limit)
            .all(&*self.connection)
            .await?;

        Ok(models.into_iter().map(to_domain).collect())
    }
}

fn to_domain(model: import_jobs::Model) -> ImportJob {
    ImportJob {
        id: model.id,
        name: model.name,
        feed_url: model.feed_url,
        status: model.status,
        schedule_interval: model.schedule_interval,
        schedule_method: model.schedule_method,
        batch_size: model.batch_size,
        total_items: model.total_items,
        processed_items: model.processed_items,
        last_run_at: model.last_run_at,
        last_error: model.last_error,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}
