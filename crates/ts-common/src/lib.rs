use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Task Types
// ============================================================================

/// A unit of work representing "attempt to consume one seat".
///
/// Tasks are opaque to the queue: they carry no seat identity, only an id
/// used for status lookup and redelivery deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationTask {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl ReservationTask {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        }
    }
}

impl Default for ReservationTask {
    fn default() -> Self {
        Self::new()
    }
}

/// A task that has been received from a queue with tracking metadata
#[derive(Debug, Clone)]
pub struct DeliveredTask {
    pub task: ReservationTask,
    pub receipt_handle: String,
    pub queue_identifier: String,
}

// ============================================================================
// Task Outcomes & Status
// ============================================================================

/// Why a reservation task did not consume a seat
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The pool is empty. Expected terminal condition, not a fault.
    SeatsExhausted,
    /// The counter store could not be read. Retryable.
    StoreRead { detail: String },
    /// The counter store rejected the decrement write. Retryable.
    StoreWrite { detail: String },
}

impl FailureReason {
    /// Whether the queue should redeliver the task
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureReason::SeatsExhausted)
    }
}

/// Terminal result of processing one reservation task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// One seat was consumed (or the task was already completed earlier)
    Completed,
    Failed(FailureReason),
}

/// Lifecycle state of a reservation task.
///
/// `Completed` and `Failed` are terminal; no transitions back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Processing,
    Completed,
    Failed { reason: FailureReason },
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed { .. })
    }
}

/// Status record for a single task, queryable by task id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    #[serde(flatten)]
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Submission Types
// ============================================================================

/// Immediate acknowledgment returned to the caller at submission time.
///
/// `Accepted` means the task was queued, not that a seat was reserved; the
/// actual outcome is asynchronous and observable via the task record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    Accepted { task_id: String },
    /// Admission is closed; no task was created
    Blocked,
    /// The queue rejected task creation
    SubmissionFailed,
}

// ============================================================================
// Configuration Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub redis_url: String,
    pub seats_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            seats_key: "available_seats".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub key_prefix: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            key_prefix: "turnstile:reservations".to_string(),
        }
    }
}

// ============================================================================
// Worker Statistics
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStats {
    pub running: bool,
    pub tasks_processed: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
}
