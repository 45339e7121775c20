//! Task queue for reservation work
//!
//! The queue is an external at-least-once task runner: it accepts
//! reservation tasks and delivers each, with a receipt handle, to the
//! consumer. The consumer ACKs tasks that reached a terminal outcome and
//! NACKs tasks that should be redelivered.
//!
//! Backends:
//! - InMemoryTaskQueue: in-process, for tests and single-node dev
//! - RedisTaskQueue (feature `redis-queue`): pending/processing lists with
//!   crash recovery

pub mod memory;
#[cfg(feature = "redis-queue")]
pub mod redis;

pub use memory::InMemoryTaskQueue;
#[cfg(feature = "redis-queue")]
pub use self::redis::RedisTaskQueue;

use async_trait::async_trait;
use ts_common::{DeliveredTask, ReservationTask};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue is stopped")]
    Closed,

    #[error("unknown receipt handle: {0}")]
    UnknownReceipt(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("queue backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Point-in-time queue depth, for monitoring
#[derive(Debug, Clone)]
pub struct QueueMetrics {
    pub queue_identifier: String,
    pub pending_tasks: u64,
    pub in_flight_tasks: u64,
}

/// Submission side of the task queue
#[async_trait]
pub trait TaskPublisher: Send + Sync {
    fn identifier(&self) -> &str;

    /// Enqueue a task. Returns the task id on success.
    async fn publish(&self, task: ReservationTask) -> Result<String>;
}

/// Consumption side of the task queue.
///
/// Delivery is at-least-once: a task that is neither ACKed nor NACKed (a
/// crashed consumer) reappears on a later poll. ACK after completion may
/// race redelivery; duplicate-delivery safety belongs to the consumer.
#[async_trait]
pub trait TaskConsumer: Send + Sync {
    fn identifier(&self) -> &str;

    /// Receive up to `max` tasks, moving them in flight. Non-blocking;
    /// returns an empty vec when the queue is idle.
    async fn poll(&self, max: usize) -> Result<Vec<DeliveredTask>>;

    /// Remove a delivered task permanently
    async fn ack(&self, receipt_handle: &str) -> Result<()>;

    /// Return a delivered task to the queue for redelivery, optionally
    /// after a delay
    async fn nack(&self, receipt_handle: &str, delay_seconds: Option<u32>) -> Result<()>;

    /// Stop accepting and delivering tasks
    async fn stop(&self);

    fn is_healthy(&self) -> bool;

    async fn metrics(&self) -> Result<Option<QueueMetrics>>;
}
