//! Out-of-band cooperative abort for running chains
//!
//! A durable marker — scoped to one job, or global with a payload naming the
//! target job — causes the dispatcher to end the chain before the next chunk
//! executes. Markers are consumed (deleted) once observed, and job status is
//! deliberately left untouched for manual inspection.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AbortSignalError;

/// Key-value presence/consume store for abort markers.
///
/// Abstracted so the core does not depend on a specific filesystem layout.
#[async_trait]
pub trait AbortSignalStore: Send + Sync {
    /// Consume the job-scoped marker if present. Returns whether one existed.
    async fn consume_job_signal(&self, job_id: Uuid) -> Result<bool, AbortSignalError>;

    /// Consume the global marker only if its payload references `job_id`.
    /// A global marker naming a different job is left in place.
    async fn consume_global_signal(&self, job_id: Uuid) -> Result<bool, AbortSignalError>;
}

/// Filesystem-backed abort signal store.
///
/// Job markers live at `<dir>/abort-<job_id>`; the global marker is
/// `<dir>/abort-all` with the targeted job id as payload.
#[derive(Debug, Clone)]
pub struct FileAbortSignalStore {
    dir: PathBuf,
}

impl FileAbortSignalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn job_signal_path(&self, job_id: Uuid) -> PathBuf {
        self.dir.join(format!("abort-{job_id}"))
    }

    fn global_signal_path(&self) -> PathBuf {
        self.dir.join("abort-all")
    }

    /// Place a job-scoped abort marker (administrative operation)
    pub async fn raise_job_signal(&self, job_id: Uuid) -> Result<(), AbortSignalError> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.job_signal_path(job_id), "").await?;
        info!("Raised abort signal for job {}", job_id);
        Ok(())
    }

    /// Place a global abort marker targeting one job (administrative
    /// operation)
    pub async fn raise_global_signal(&self, job_id: Uuid) -> Result<(), AbortSignalError> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.global_signal_path(), job_id.to_string()).await?;
        info!("Raised global abort signal targeting job {}", job_id);
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> Result<bool, AbortSignalError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl AbortSignalStore for FileAbortSignalStore {
    async fn consume_job_signal(&self, job_id: Uuid) -> Result<bool, AbortSignalError> {
        remove_if_exists(&self.job_signal_path(job_id)).await
    }

    async fn consume_global_signal(&self, job_id: Uuid) -> Result<bool, AbortSignalError> {
        let path = self.global_signal_path();
        let payload = match fs::read_to_string(&path).await {
            Ok(payload) => payload,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        if payload.contains(&job_id.to_string()) {
            remove_if_exists(&path).await?;
            Ok(true)
        } else {
            debug!("Global abort signal targets a different job, leaving it");
            Ok(false)
        }
    }
}

/// Checks abort markers strictly before each chunk execution
#[derive(Clone)]
pub struct KillSwitch {
    store: std::sync::Arc<dyn AbortSignalStore>,
}

impl KillSwitch {
    pub fn new(store: std::sync::Arc<dyn AbortSignalStore>) -> Self {
        Self { store }
    }

    /// True when the chain must terminate without executing another chunk.
    /// Observed markers are consumed.
    pub async fn should_abort(&self, job_id: Uuid) -> Result<bool, AbortSignalError> {
        if self.store.consume_job_signal(job_id).await? {
            info!("Consumed abort signal for job {}", job_id);
            return Ok(true);
        }
        if self.store.consume_global_signal(job_id).await? {
            info!("Consumed global abort signal for job {}", job_id);
            return Ok(true);
        }
        Ok(false)
    }
}
