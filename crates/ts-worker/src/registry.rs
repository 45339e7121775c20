//! Task registry - per-task status records.
//!
//! Serves two purposes:
//! - callers can look up the asynchronous outcome of a submission by task
//!   id (the immediate HTTP acknowledgment only means "queued")
//! - the worker consults it before decrementing, making redelivery of an
//!   already-completed task a no-op. This is the explicit idempotency
//!   marker required under at-least-once delivery.
//!
//! Terminal records are pruned after a retention window to bound memory.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use ts_common::{TaskOutcome, TaskRecord, TaskState};

pub struct TaskRegistry {
    records: DashMap<String, TaskRecord>,
    retention: Duration,
}

impl TaskRegistry {
    pub fn new(retention_secs: u64) -> Self {
        Self {
            records: DashMap::new(),
            retention: Duration::seconds(retention_secs as i64),
        }
    }

    /// Record a freshly submitted task
    pub fn insert_queued(&self, task_id: &str) {
        let now = Utc::now();
        self.records.insert(
            task_id.to_string(),
            TaskRecord {
                task_id: task_id.to_string(),
                state: TaskState::Queued,
                created_at: now,
                updated_at: now,
            },
        );
    }

    /// Drop a record whose task never made it into the queue
    pub fn remove(&self, task_id: &str) {
        self.records.remove(task_id);
    }

    /// Mark a task as picked up by the worker. Terminal states win: a
    /// redelivered task that already finished stays finished.
    pub fn mark_processing(&self, task_id: &str) {
        if let Some(mut entry) = self.records.get_mut(task_id) {
            if !entry.state.is_terminal() {
                entry.state = TaskState::Processing;
                entry.updated_at = Utc::now();
            }
        }
    }

    /// Record the terminal outcome of a task.
    ///
    /// A task delivered outside the submission path (queue recovery after
    /// the registry was lost) gets a fresh record so its outcome is still
    /// observable.
    pub fn record_outcome(&self, task_id: &str, outcome: &TaskOutcome) {
        let state = match outcome {
            TaskOutcome::Completed => TaskState::Completed,
            TaskOutcome::Failed(reason) => TaskState::Failed {
                reason: reason.clone(),
            },
        };

        let now = Utc::now();
        self.records
            .entry(task_id.to_string())
            .and_modify(|record| {
                if !record.state.is_terminal() {
                    record.state = state.clone();
                    record.updated_at = now;
                }
            })
            .or_insert_with(|| TaskRecord {
                task_id: task_id.to_string(),
                state: state.clone(),
                created_at: now,
                updated_at: now,
            });
    }

    pub fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.records.get(task_id).map(|entry| entry.value().clone())
    }

    /// Whether a task already consumed its seat. Used by the worker to make
    /// redelivery a no-op.
    pub fn is_completed(&self, task_id: &str) -> bool {
        self.records
            .get(task_id)
            .map(|entry| matches!(entry.state, TaskState::Completed))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop terminal records older than the retention window. Returns the
    /// number pruned. Non-terminal records are never pruned.
    pub fn prune_terminal(&self) -> usize {
        let cutoff = Utc::now() - self.retention;
        let before = self.records.len();
        self.records
            .retain(|_, record| !(record.state.is_terminal() && record.updated_at < cutoff));
        let pruned = before.saturating_sub(self.records.len());
        if pruned > 0 {
            debug!(pruned = pruned, remaining = self.records.len(), "Pruned terminal task records");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_common::FailureReason;

    fn failed(reason: FailureReason) -> TaskOutcome {
        TaskOutcome::Failed(reason)
    }

    #[test]
    fn queued_then_completed() {
        let registry = TaskRegistry::new(3600);
        registry.insert_queued("t-1");
        registry.mark_processing("t-1");
        registry.record_outcome("t-1", &TaskOutcome::Completed);

        assert!(registry.is_completed("t-1"));
        let record = registry.get("t-1").unwrap();
        assert_eq!(record.state, TaskState::Completed);
    }

    #[test]
    fn terminal_state_is_sticky() {
        let registry = TaskRegistry::new(3600);
        registry.insert_queued("t-1");
        registry.record_outcome("t-1", &TaskOutcome::Completed);

        // Redelivery must not demote a finished task
        registry.mark_processing("t-1");
        registry.record_outcome("t-1", &failed(FailureReason::SeatsExhausted));

        assert!(registry.is_completed("t-1"));
    }

    #[test]
    fn retryable_failure_is_recorded_but_not_completed() {
        let registry = TaskRegistry::new(3600);
        registry.insert_queued("t-1");
        registry.record_outcome(
            "t-1",
            &failed(FailureReason::StoreWrite { detail: "timeout".into() }),
        );

        assert!(!registry.is_completed("t-1"));
        let record = registry.get("t-1").unwrap();
        assert!(matches!(record.state, TaskState::Failed { .. }));
    }

    #[test]
    fn unknown_task_has_no_record() {
        let registry = TaskRegistry::new(3600);
        assert!(registry.get("missing").is_none());
        assert!(!registry.is_completed("missing"));
    }

    #[test]
    fn prune_drops_only_old_terminal_records() {
        // Zero retention: terminal records are immediately prunable
        let registry = TaskRegistry::new(0);
        registry.insert_queued("done");
        registry.record_outcome("done", &TaskOutcome::Completed);
        registry.insert_queued("pending");

        let pruned = registry.prune_terminal();
        assert_eq!(pruned, 1);
        assert!(registry.get("done").is_none());
        assert!(registry.get("pending").is_some());
    }
}
