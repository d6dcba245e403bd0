//! Task queue type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// What a queued task does when drained
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// One invocation of the chunk dispatcher for a job chain
    ProcessChunk { job_id: Uuid, offset: u64 },
    /// One schedule poller tick
    PollSchedules,
}

impl TaskKind {
    /// Deduplication key. Chunk tasks dedupe per job id: at most one pending
    /// continuation may exist for a chain.
    pub fn task_key(&self) -> String {
        match self {
            TaskKind::ProcessChunk { job_id, .. } => format!("chunk:{job_id}"),
            TaskKind::PollSchedules => "poll:schedules".to_string(),
        }
    }

    /// The job this task belongs to, if any
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            TaskKind::ProcessChunk { job_id, .. } => Some(*job_id),
            TaskKind::PollSchedules => None,
        }
    }
}

/// A task waiting in the work queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTask {
    /// Unique task instance identifier
    pub id: Uuid,
    pub kind: TaskKind,
    /// Earliest time the queue may hand this task to a worker
    pub not_before: DateTime<Utc>,
}

impl QueuedTask {
    /// Create a task runnable immediately
    pub fn new(kind: TaskKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            not_before: Utc::now(),
        }
    }

    /// Create a task held back until `not_before`
    pub fn delayed(kind: TaskKind, not_before: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            not_before,
        }
    }

    pub fn task_key(&self) -> String {
        self.kind.task_key()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    /// Earlier `not_before` first, task id as tie-breaker
    fn cmp(&self, other: &Self) -> Ordering {
        self.not_before
            .cmp(&other.not_before)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Predicate over pending tasks for `has_pending` and `cancel_all`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    pub action: TaskAction,
    pub job_id: Option<Uuid>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    ProcessChunk,
    PollSchedules,
}

impl TaskFilter {
    /// Any pending chunk continuation for a job, regardless of offset
    pub fn chunks_for(job_id: Uuid) -> Self {
        Self {
            action: TaskAction::ProcessChunk,
            job_id: Some(job_id),
            offset: None,
        }
    }

    /// A pending chunk continuation at an exact offset
    pub fn chunk_at(job_id: Uuid, offset: u64) -> Self {
        Self {
            action: TaskAction::ProcessChunk,
            job_id: Some(job_id),
            offset: Some(offset),
        }
    }

    /// The recurring poller tick
    pub fn poll_ticks() -> Self {
        Self {
            action: TaskAction::PollSchedules,
            job_id: None,
            offset: None,
        }
    }

    pub fn matches(&self, kind: &TaskKind) -> bool {
        match (self.action, kind) {
            (TaskAction::ProcessChunk, TaskKind::ProcessChunk { job_id, offset }) => {
                self.job_id.is_none_or(|id| id == *job_id)
                    && self.offset.is_none_or(|o| o == *offset)
            }
            (TaskAction::PollSchedules, TaskKind::PollSchedules) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_task_key_dedupes_per_job() {
        let job_id = Uuid::new_v4();
        let at_zero = TaskKind::ProcessChunk { job_id, offset: 0 };
        let at_fifty = TaskKind::ProcessChunk { job_id, offset: 50 };

        assert_eq!(at_zero.task_key(), format!("chunk:{job_id}"));
        assert_eq!(at_zero.task_key(), at_fifty.task_key());
        assert_eq!(TaskKind::PollSchedules.task_key(), "poll:schedules");
    }

    #[test]
    fn test_task_ordering_by_not_before() {
        let now = Utc::now();
        let sooner = QueuedTask::delayed(TaskKind::PollSchedules, now);
        let later = QueuedTask::delayed(TaskKind::PollSchedules, now + Duration::seconds(10));

        assert!(sooner < later);
        assert!(sooner.is_due(now));
        assert!(!later.is_due(now));
    }

    #[test]
    fn test_filter_matching() {
        let job_id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let chunk = TaskKind::ProcessChunk { job_id, offset: 40 };

        assert!(TaskFilter::chunks_for(job_id).matches(&chunk));
        assert!(TaskFilter::chunk_at(job_id, 40).matches(&chunk));
        assert!(!TaskFilter::chunk_at(job_id, 0).matches(&chunk));
        assert!(!TaskFilter::chunks_for(other).matches(&chunk));
        assert!(!TaskFilter::poll_ticks().matches(&chunk));
        assert!(TaskFilter::poll_ticks().matches(&TaskKind::PollSchedules));
    }
}
