//! One bounded importer invocation, classified into an explicit outcome

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::ImporterError;
use crate::models::{ChunkResult, ImportJob};

/// The external importer contract.
///
/// Implementations must be safe to call repeatedly with the same
/// `(job_id, offset)` — delivery of chunk tasks is at-least-once.
#[async_trait]
pub trait ChunkImporter: Send + Sync {
    async fn process_chunk(
        &self,
        offset: u64,
        limit: u64,
        job_id: Uuid,
    ) -> Result<ChunkResult, ImporterError>;
}

/// Classified result of one chunk execution.
///
/// Failures travel as data; nothing here unwinds across chunk boundaries.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// Items were processed and more remain
    Progress {
        /// Offset the next chunk resumes from
        next_offset: u64,
        processed_in_chunk: u64,
        /// Feed size, once the importer has discovered it
        total_items: Option<u64>,
    },
    /// No more items remain
    Completed,
    /// Another process holds the job's execution lock; retry the same offset
    Locked,
    /// The job was cooperatively halted mid-chunk
    Stopped,
    /// The importer failed; the chain must terminate without retry
    Failed { message: String },
}

/// Invokes the external importer for one bounded unit of work
pub struct ChunkExecutor {
    importer: Arc<dyn ChunkImporter>,
    default_batch_size: u32,
}

impl ChunkExecutor {
    pub fn new(importer: Arc<dyn ChunkImporter>, default_batch_size: u32) -> Self {
        Self {
            importer,
            default_batch_size,
        }
    }

    /// Run one chunk for `job` starting at `offset`
    pub async fn execute(&self, job: &ImportJob, offset: u64) -> ChunkOutcome {
        let limit = job.effective_batch_size(self.default_batch_size);
        debug!(
            "Executing chunk for job {} (offset: {}, limit: {})",
            job.id, offset, limit
        );

        match self.importer.process_chunk(offset, limit, job.id).await {
            Ok(result) => Self::classify(offset, limit, result),
            Err(e) => {
                warn!("Importer failed for job {} at offset {}: {}", job.id, offset, e);
                ChunkOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    fn classify(offset: u64, limit: u64, result: ChunkResult) -> ChunkOutcome {
        if result.completed {
            ChunkOutcome::Completed
        } else if result.locked {
            ChunkOutcome::Locked
        } else if result.stopped {
            ChunkOutcome::Stopped
        } else {
            ChunkOutcome::Progress {
                next_offset: result.total_processed.unwrap_or(offset + limit),
                processed_in_chunk: result.processed_in_chunk,
                total_items: result.total_items,
            }
        }
    }
}
