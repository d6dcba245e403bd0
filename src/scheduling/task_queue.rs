//! Durable delayed-task queue collaborator
//!
//! The scheduling core never blocks between chunks: waiting is always modeled
//! as a re-enqueue with a future `not_before`. Production deployments supply
//! a durable backend behind `TaskQueue`; `InMemoryTaskQueue` provides the
//! same semantics in-process for tests and single-node embedders.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::{QueuedTask, TaskFilter, TaskKind};
use crate::errors::QueueError;

/// Work queue contract consumed by the dispatcher, rescuer, and poller.
///
/// Delivery is at-least-once; tasks with the same key are deduplicated while
/// pending, and `not_before` is a lower bound, not an exact delivery time.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue unless a pending task with the same key already exists.
    /// Returns `Ok(true)` if the task was enqueued.
    async fn enqueue_once(&self, task: QueuedTask) -> Result<bool, QueueError>;

    /// Whether any pending task matches the filter
    async fn has_pending(&self, filter: &TaskFilter) -> Result<bool, QueueError>;

    /// Remove all pending tasks (and recurring registrations) matching the
    /// filter, returning how many were removed
    async fn cancel_all(&self, filter: &TaskFilter) -> Result<usize, QueueError>;

    /// Register a recurring task: enqueued at `first_run`, then re-armed
    /// every `every` after each drain. Idempotent — a second registration
    /// with the same key is a no-op returning `Ok(false)`.
    async fn enqueue_recurring(
        &self,
        kind: TaskKind,
        first_run: DateTime<Utc>,
        every: StdDuration,
    ) -> Result<bool, QueueError>;
}

/// In-process task queue: time-ordered min-heap with pending-key dedup
#[derive(Debug, Default)]
pub struct InMemoryTaskQueue {
    pending: Arc<RwLock<BinaryHeap<Reverse<QueuedTask>>>>,
    pending_keys: Arc<RwLock<HashSet<String>>>,
    recurring: Arc<RwLock<HashMap<String, (TaskKind, StdDuration)>>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop up to `limit` tasks whose `not_before` has passed. Recurring tasks
    /// are re-armed one period after `now` as they are taken.
    pub async fn take_due(&self, now: DateTime<Utc>, limit: usize) -> Vec<QueuedTask> {
        let mut pending = self.pending.write().await;
        let mut pending_keys = self.pending_keys.write().await;
        let recurring = self.recurring.read().await;

        let mut due = Vec::new();
        while due.len() < limit {
            match pending.pop() {
                Some(Reverse(task)) if task.is_due(now) => {
                    pending_keys.remove(&task.task_key());
                    due.push(task);
                }
                Some(entry) => {
                    // Heap front is in the future; push it back and stop
                    pending.push(entry);
                    break;
                }
                None => break,
            }
        }

        // Re-arm recurring tasks so exactly one next occurrence stays pending
        for task in &due {
            let key = task.task_key();
            if let Some((kind, every)) = recurring.get(&key) {
                let next = QueuedTask::delayed(
                    kind.clone(),
                    now + chrono::Duration::from_std(*every)
                        .unwrap_or_else(|_| chrono::Duration::seconds(60)),
                );
                pending_keys.insert(key);
                pending.push(Reverse(next));
            }
        }

        if !due.is_empty() {
            debug!("Took {} due tasks from queue", due.len());
        }

        due
    }

    /// Number of pending tasks
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue_once(&self, task: QueuedTask) -> Result<bool, QueueError> {
        let key = task.task_key();
        let mut pending_keys = self.pending_keys.write().await;

        if pending_keys.contains(&key) {
            debug!("Skipping duplicate task for key: {}", key);
            return Ok(false);
        }
        pending_keys.insert(key.clone());
        drop(pending_keys);

        debug!(
            "Enqueued task {} (not before {})",
            key,
            task.not_before.format("%Y-%m-%d %H:%M:%S UTC")
        );
        self.pending.write().await.push(Reverse(task));
        Ok(true)
    }

    async fn has_pending(&self, filter: &TaskFilter) -> Result<bool, QueueError> {
        let pending = self.pending.read().await;
        Ok(pending.iter().any(|Reverse(task)| filter.matches(&task.kind)))
    }

    async fn cancel_all(&self, filter: &TaskFilter) -> Result<usize, QueueError> {
        let mut pending = self.pending.write().await;
        let mut pending_keys = self.pending_keys.write().await;
        let mut recurring = self.recurring.write().await;

        let before = pending.len();
        let mut kept = BinaryHeap::new();
        for Reverse(task) in pending.drain() {
            if filter.matches(&task.kind) {
                pending_keys.remove(&task.task_key());
            } else {
                kept.push(Reverse(task));
            }
        }
        *pending = kept;
        recurring.retain(|_, (kind, _)| !filter.matches(kind));

        let cancelled = before - pending.len();
        if cancelled > 0 {
            debug!("Cancelled {} pending tasks", cancelled);
        }
        Ok(cancelled)
    }

    async fn enqueue_recurring(
        &self,
        kind: TaskKind,
        first_run: DateTime<Utc>,
        every: StdDuration,
    ) -> Result<bool, QueueError> {
        let key = kind.task_key();
        {
            let mut recurring = self.recurring.write().await;
            if recurring.contains_key(&key) {
                debug!("Recurring task {} already registered", key);
                return Ok(false);
            }
            recurring.insert(key, (kind.clone(), every));
        }
        self.enqueue_once(QueuedTask::delayed(kind, first_run)).await
    }
}
