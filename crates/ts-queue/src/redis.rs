//! Redis-backed task queue.
//!
//! Reliable-queue pattern over two keys:
//! - `{prefix}:pending`    list of serialized tasks, LPUSH on publish
//! - `{prefix}:processing` hash of receipt handle -> serialized task
//!
//! A task is moved into the processing hash on poll and removed on ACK.
//! NACK moves it back to the pending list. Tasks left in the processing
//! hash by a crashed consumer are requeued by `recover` at startup, which
//! is where the at-least-once redelivery semantics come from.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, info, warn};

use ts_common::{DeliveredTask, QueueConfig, ReservationTask};

use crate::{QueueError, QueueMetrics, Result, TaskConsumer, TaskPublisher};

pub struct RedisTaskQueue {
    conn: ConnectionManager,
    pending_key: String,
    processing_key: String,
    identifier: String,
    stopped: AtomicBool,
}

impl RedisTaskQueue {
    pub async fn connect(redis_url: &str, config: &QueueConfig) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        Ok(Self {
            conn,
            pending_key: format!("{}:pending", config.key_prefix),
            processing_key: format!("{}:processing", config.key_prefix),
            identifier: format!("redis:{}", config.key_prefix),
            stopped: AtomicBool::new(false),
        })
    }

    /// Requeue tasks a previous process left in the processing hash.
    ///
    /// Call once at startup, before the consumer loop starts. Returns the
    /// number of tasks recovered.
    pub async fn recover(&self) -> Result<u64> {
        let mut conn = self.conn.clone();

        let orphaned: Vec<String> = conn
            .hvals(&self.processing_key)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        if orphaned.is_empty() {
            return Ok(0);
        }

        let count = orphaned.len() as u64;
        for payload in orphaned {
            let _: () = conn
                .lpush(&self.pending_key, payload)
                .await
                .map_err(|e| QueueError::Backend(e.to_string()))?;
        }

        let _: () = conn
            .del(&self.processing_key)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        info!(queue = %self.identifier, recovered = count, "Requeued orphaned in-flight tasks");
        Ok(count)
    }

    async fn take_processing(&self, receipt_handle: &str) -> Result<ReservationTask> {
        let mut conn = self.conn.clone();

        let payload: Option<String> = conn
            .hget(&self.processing_key, receipt_handle)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        let payload =
            payload.ok_or_else(|| QueueError::UnknownReceipt(receipt_handle.to_string()))?;

        let _: () = conn
            .hdel(&self.processing_key, receipt_handle)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        Ok(serde_json::from_str(&payload)?)
    }
}

#[async_trait]
impl TaskPublisher for RedisTaskQueue {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn publish(&self, task: ReservationTask) -> Result<String> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let id = task.id.clone();
        let payload = serde_json::to_string(&task)?;

        let mut conn = self.conn.clone();
        let _: () = conn
            .lpush(&self.pending_key, payload)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        debug!(queue = %self.identifier, task_id = %id, "Task enqueued");
        Ok(id)
    }
}

#[async_trait]
impl TaskConsumer for RedisTaskQueue {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn poll(&self, max: usize) -> Result<Vec<DeliveredTask>> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let mut conn = self.conn.clone();
        let mut delivered = Vec::new();

        for _ in 0..max {
            let payload: Option<String> = conn
                .rpop(&self.pending_key, None)
                .await
                .map_err(|e| QueueError::Backend(e.to_string()))?;

            let Some(payload) = payload else {
                break;
            };

            let receipt_handle = uuid::Uuid::new_v4().to_string();
            let _: () = conn
                .hset(&self.processing_key, &receipt_handle, &payload)
                .await
                .map_err(|e| QueueError::Backend(e.to_string()))?;

            match serde_json::from_str::<ReservationTask>(&payload) {
                Ok(task) => delivered.push(DeliveredTask {
                    task,
                    receipt_handle,
                    queue_identifier: self.identifier.clone(),
                }),
                Err(e) => {
                    // Poison payload: drop it rather than redeliver forever
                    warn!(queue = %self.identifier, error = %e, "Discarding undecodable task payload");
                    let _: () = conn
                        .hdel(&self.processing_key, &receipt_handle)
                        .await
                        .map_err(|e| QueueError::Backend(e.to_string()))?;
                }
            }
        }

        Ok(delivered)
    }

    async fn ack(&self, receipt_handle: &str) -> Result<()> {
        self.take_processing(receipt_handle).await.map(|_| ())
    }

    async fn nack(&self, receipt_handle: &str, delay_seconds: Option<u32>) -> Result<()> {
        let task = self.take_processing(receipt_handle).await?;
        let payload = serde_json::to_string(&task)?;

        if let Some(secs) = delay_seconds.filter(|s| *s > 0) {
            tokio::time::sleep(Duration::from_secs(secs as u64)).await;
        }

        let mut conn = self.conn.clone();
        let _: () = conn
            .rpush(&self.pending_key, payload)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        debug!(queue = %self.identifier, task_id = %task.id, "Task NACKed, requeued");
        Ok(())
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_healthy(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    async fn metrics(&self) -> Result<Option<QueueMetrics>> {
        let mut conn = self.conn.clone();

        let pending: u64 = conn
            .llen(&self.pending_key)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let in_flight: u64 = conn
            .hlen(&self.processing_key)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        Ok(Some(QueueMetrics {
            queue_identifier: self.identifier.clone(),
            pending_tasks: pending,
            in_flight_tasks: in_flight,
        }))
    }
}
