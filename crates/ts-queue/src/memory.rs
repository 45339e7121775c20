//! In-process task queue with redelivery support.
//!
//! Tasks move pending -> in-flight on poll and back on NACK, so the
//! at-least-once contract can be exercised without an external broker.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use ts_common::{DeliveredTask, ReservationTask};

use crate::{QueueError, QueueMetrics, Result, TaskConsumer, TaskPublisher};

pub struct InMemoryTaskQueue {
    name: String,
    pending: Arc<Mutex<VecDeque<ReservationTask>>>,
    in_flight: DashMap<String, ReservationTask>,
    stopped: AtomicBool,
}

impl InMemoryTaskQueue {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pending: Arc::new(Mutex::new(VecDeque::new())),
            in_flight: DashMap::new(),
            stopped: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TaskPublisher for InMemoryTaskQueue {
    fn identifier(&self) -> &str {
        &self.name
    }

    async fn publish(&self, task: ReservationTask) -> Result<String> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let id = task.id.clone();
        self.pending.lock().push_back(task);
        debug!(queue = %self.name, task_id = %id, "Task enqueued");
        Ok(id)
    }
}

#[async_trait]
impl TaskConsumer for InMemoryTaskQueue {
    fn identifier(&self) -> &str {
        &self.name
    }

    async fn poll(&self, max: usize) -> Result<Vec<DeliveredTask>> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let mut delivered = Vec::new();
        {
            let mut pending = self.pending.lock();
            for _ in 0..max {
                let Some(task) = pending.pop_front() else {
                    break;
                };
                let receipt_handle = uuid::Uuid::new_v4().to_string();
                self.in_flight.insert(receipt_handle.clone(), task.clone());
                delivered.push(DeliveredTask {
                    task,
                    receipt_handle,
                    queue_identifier: self.name.clone(),
                });
            }
        }

        Ok(delivered)
    }

    async fn ack(&self, receipt_handle: &str) -> Result<()> {
        self.in_flight
            .remove(receipt_handle)
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownReceipt(receipt_handle.to_string()))
    }

    async fn nack(&self, receipt_handle: &str, delay_seconds: Option<u32>) -> Result<()> {
        let (_, task) = self
            .in_flight
            .remove(receipt_handle)
            .ok_or_else(|| QueueError::UnknownReceipt(receipt_handle.to_string()))?;

        debug!(queue = %self.name, task_id = %task.id, delay = ?delay_seconds, "Task NACKed, requeueing");

        match delay_seconds {
            None | Some(0) => self.pending.lock().push_front(task),
            Some(secs) => {
                let pending = self.pending.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(secs as u64)).await;
                    pending.lock().push_front(task);
                });
            }
        }

        Ok(())
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_healthy(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    async fn metrics(&self) -> Result<Option<QueueMetrics>> {
        Ok(Some(QueueMetrics {
            queue_identifier: self.name.clone(),
            pending_tasks: self.pending.lock().len() as u64,
            in_flight_tasks: self.in_flight.len() as u64,
        }))
    }
}
