//! Task submission path.
//!
//! Fire-and-forget: the caller gets an immediate acknowledgment that the
//! task was queued (or why not), never the reservation outcome itself.
//! The task id in the acknowledgment keys the registry lookup.

use std::sync::Arc;

use tracing::{debug, warn};

use ts_common::{ReservationTask, SubmissionResult};
use ts_queue::TaskPublisher;

use crate::gate::AdmissionGate;
use crate::registry::TaskRegistry;

pub struct ReservationService {
    publisher: Arc<dyn TaskPublisher>,
    gate: Arc<AdmissionGate>,
    registry: Arc<TaskRegistry>,
}

impl ReservationService {
    pub fn new(
        publisher: Arc<dyn TaskPublisher>,
        gate: Arc<AdmissionGate>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        Self {
            publisher,
            gate,
            registry,
        }
    }

    /// Attempt to queue one seat reservation
    pub async fn submit(&self) -> SubmissionResult {
        if !self.gate.is_open() {
            debug!("Submission blocked, admission closed");
            return SubmissionResult::Blocked;
        }

        let task = ReservationTask::new();
        let task_id = task.id.clone();

        // Registry entry goes in first so the record exists by the time the
        // worker can see the task.
        self.registry.insert_queued(&task_id);

        match self.publisher.publish(task).await {
            Ok(_) => {
                debug!(task_id = %task_id, "Reservation task submitted");
                SubmissionResult::Accepted { task_id }
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Task creation failed");
                self.registry.remove(&task_id);
                SubmissionResult::SubmissionFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use ts_queue::{QueueError, Result as QueueResult};

    struct RecordingPublisher {
        published: AtomicUsize,
        fail: AtomicBool,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            Self {
                published: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl TaskPublisher for RecordingPublisher {
        fn identifier(&self) -> &str {
            "recording"
        }

        async fn publish(&self, task: ReservationTask) -> QueueResult<String> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(QueueError::Backend("broker down".to_string()));
            }
            self.published.fetch_add(1, Ordering::SeqCst);
            Ok(task.id)
        }
    }

    fn service(publisher: Arc<RecordingPublisher>) -> (ReservationService, Arc<AdmissionGate>, Arc<TaskRegistry>) {
        let gate = Arc::new(AdmissionGate::new());
        let registry = Arc::new(TaskRegistry::new(3600));
        let service = ReservationService::new(publisher, gate.clone(), registry.clone());
        (service, gate, registry)
    }

    #[tokio::test]
    async fn accepted_submission_creates_task_and_record() {
        let publisher = Arc::new(RecordingPublisher::new());
        let (service, _, registry) = service(publisher.clone());

        let result = service.submit().await;
        let SubmissionResult::Accepted { task_id } = result else {
            panic!("expected Accepted, got {result:?}");
        };

        assert_eq!(publisher.published.load(Ordering::SeqCst), 1);
        assert!(registry.get(&task_id).is_some());
    }

    #[tokio::test]
    async fn closed_gate_blocks_without_creating_a_task() {
        let publisher = Arc::new(RecordingPublisher::new());
        let (service, gate, registry) = service(publisher.clone());
        gate.close();

        assert_eq!(service.submit().await, SubmissionResult::Blocked);
        assert_eq!(publisher.published.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn publish_failure_rolls_back_the_record() {
        let publisher = Arc::new(RecordingPublisher::new());
        publisher.fail.store(true, Ordering::SeqCst);
        let (service, _, registry) = service(publisher.clone());

        assert_eq!(service.submit().await, SubmissionResult::SubmissionFailed);
        assert!(registry.is_empty());
    }
}
