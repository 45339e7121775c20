//! Worker runner - the single serialized consumer loop.
//!
//! Exactly one loop polls the queue, one task at a time, and each
//! `process` call is awaited to completion before the next poll. No two
//! invocations overlap, which is what makes the processor's unlocked
//! check-then-act safe against the lost-update race.
//!
//! The loop is started once at process startup. Triggering "process" over
//! HTTP never registers another consumer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use ts_common::{DeliveredTask, TaskOutcome, WorkerStats};
use ts_queue::{QueueMetrics, TaskConsumer};

use crate::processor::ReservationProcessor;
use crate::registry::TaskRegistry;

/// Redelivery delay requested when a task fails on a store error
const RETRY_DELAY_SECONDS: u32 = 5;

pub struct WorkerRunner {
    consumer: Arc<dyn TaskConsumer>,
    processor: Arc<ReservationProcessor>,
    registry: Arc<TaskRegistry>,
    started: AtomicBool,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    tasks_processed: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
}

impl WorkerRunner {
    pub fn new(
        consumer: Arc<dyn TaskConsumer>,
        processor: Arc<ReservationProcessor>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            consumer,
            processor,
            registry,
            started: AtomicBool::new(false),
            running: AtomicBool::new(false),
            shutdown_tx,
            tasks_processed: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
        }
    }

    /// Spawn the consumer loop. Safe to call repeatedly; only the first
    /// call starts anything.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Worker already started, ignoring");
            return;
        }

        let runner = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        self.running.store(true, Ordering::SeqCst);
        info!(consumer = %self.consumer.identifier(), "Starting reservation worker");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Reservation worker shutting down");
                        break;
                    }
                    result = runner.consumer.poll(1) => {
                        match result {
                            Ok(mut delivered) => {
                                match delivered.pop() {
                                    Some(task) => runner.handle_delivery(task).await,
                                    None => {
                                        // Queue idle, brief pause
                                        tokio::time::sleep(Duration::from_millis(100)).await;
                                    }
                                }
                            }
                            Err(e) => {
                                error!(error = %e, consumer = %runner.consumer.identifier(), "Error polling queue");
                                tokio::time::sleep(Duration::from_secs(1)).await;
                            }
                        }
                    }
                }
            }
            runner.running.store(false, Ordering::SeqCst);
        });
    }

    async fn handle_delivery(&self, delivered: DeliveredTask) {
        let task_id = delivered.task.id.clone();
        self.registry.mark_processing(&task_id);
        self.tasks_processed.fetch_add(1, Ordering::SeqCst);

        let outcome = self.processor.process(&delivered.task).await;
        // Record before ACK/NACK so a racing redelivery observes the
        // terminal state.
        self.registry.record_outcome(&task_id, &outcome);

        match &outcome {
            TaskOutcome::Completed => {
                self.tasks_completed.fetch_add(1, Ordering::SeqCst);
                if let Err(e) = self.consumer.ack(&delivered.receipt_handle).await {
                    warn!(task_id = %task_id, error = %e, "ACK failed for completed task");
                }
            }
            TaskOutcome::Failed(reason) => {
                self.tasks_failed.fetch_add(1, Ordering::SeqCst);
                let result = if reason.is_retryable() {
                    self.consumer
                        .nack(&delivered.receipt_handle, Some(RETRY_DELAY_SECONDS))
                        .await
                } else {
                    // Exhaustion is terminal, redelivery would be pointless
                    self.consumer.ack(&delivered.receipt_handle).await
                };
                if let Err(e) = result {
                    warn!(task_id = %task_id, error = %e, "ACK/NACK failed for failed task");
                }
            }
        }
    }

    /// Whether the consumer loop is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            running: self.is_running(),
            tasks_processed: self.tasks_processed.load(Ordering::SeqCst),
            tasks_completed: self.tasks_completed.load(Ordering::SeqCst),
            tasks_failed: self.tasks_failed.load(Ordering::SeqCst),
        }
    }

    pub async fn queue_metrics(&self) -> Option<QueueMetrics> {
        match self.consumer.metrics().await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(error = %e, "Failed to read queue metrics");
                None
            }
        }
    }

    pub fn queue_healthy(&self) -> bool {
        self.consumer.is_healthy()
    }

    /// Graceful shutdown: stop the loop, then stop the consumer
    pub async fn shutdown(&self) {
        info!("Worker runner shutting down...");
        let _ = self.shutdown_tx.send(());
        self.consumer.stop().await;
    }
}
