//! Centralized error handling for the import scheduler
//!
//! Chunk-level outcomes (lock contention, kill signals, importer failures)
//! are modeled as data on `scheduling::DispatchOutcome` and never unwind the
//! stack across chunk boundaries; the types here cover infrastructure
//! failures only.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using SchedulerError
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;
