//! Error type definitions for the import scheduler

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for scheduler operations
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Work queue collaborator errors
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Abort signal store errors
    #[error("Abort signal error: {0}")]
    AbortSignal(#[from] AbortSignalError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Import job not found
    #[error("Import job not found: {id}")]
    NotFound { id: Uuid },
}

/// Errors surfaced by a work queue backend
#[derive(Error, Debug)]
pub enum QueueError {
    /// Backend unavailable or rejected the operation
    #[error("Queue backend error: {message}")]
    Backend { message: String },
}

/// Errors from the abort signal store
#[derive(Error, Debug)]
pub enum AbortSignalError {
    /// Marker read/write/delete failed
    #[error("Abort signal store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by the external importer for a single chunk
#[derive(Error, Debug)]
#[error("Chunk import failed: {message}")]
pub struct ImporterError {
    pub message: String,
}

impl ImporterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
