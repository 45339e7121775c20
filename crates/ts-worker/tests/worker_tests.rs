//! End-to-end worker tests
//!
//! Drive the full loop (submission -> queue -> serialized worker -> store)
//! against the in-memory store and queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ts_common::{ReservationTask, SubmissionResult, TaskState};
use ts_queue::{InMemoryTaskQueue, TaskConsumer, TaskPublisher};
use ts_store::{MemorySeatStore, SeatStore};
use ts_worker::{
    AdmissionGate, ReservationProcessor, ReservationService, TaskRegistry, WorkerRunner,
};

struct Harness {
    store: Arc<MemorySeatStore>,
    queue: Arc<InMemoryTaskQueue>,
    gate: Arc<AdmissionGate>,
    registry: Arc<TaskRegistry>,
    runner: Arc<WorkerRunner>,
    service: ReservationService,
}

fn harness(initial_seats: u64) -> Harness {
    let store = Arc::new(MemorySeatStore::default());
    store.set_raw(&initial_seats.to_string());

    let queue = Arc::new(InMemoryTaskQueue::new("reservations"));
    let gate = Arc::new(AdmissionGate::new());
    let registry = Arc::new(TaskRegistry::new(3600));

    let processor = Arc::new(ReservationProcessor::new(
        store.clone(),
        gate.clone(),
        registry.clone(),
    ));
    let runner = Arc::new(WorkerRunner::new(
        queue.clone(),
        processor,
        registry.clone(),
    ));
    let service = ReservationService::new(queue.clone(), gate.clone(), registry.clone());

    Harness {
        store,
        queue,
        gate,
        registry,
        runner,
        service,
    }
}

async fn wait_until<F: Fn() -> bool>(condition: F, what: &str) {
    // Generous: retryable failures are redelivered after a multi-second delay
    let deadline = Instant::now() + Duration::from_secs(15);
    while !condition() {
        if Instant::now() > deadline {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn terminal_count(registry: &TaskRegistry, ids: &[String]) -> usize {
    ids.iter()
        .filter_map(|id| registry.get(id))
        .filter(|r| r.state.is_terminal())
        .count()
}

#[tokio::test]
async fn oversubscribed_pool_completes_exactly_k_tasks() {
    let h = harness(3);

    let mut task_ids = Vec::new();
    for _ in 0..5 {
        match h.service.submit().await {
            SubmissionResult::Accepted { task_id } => task_ids.push(task_id),
            other => panic!("expected Accepted, got {other:?}"),
        }
    }

    h.runner.start();
    let registry = h.registry.clone();
    let ids = task_ids.clone();
    wait_until(|| terminal_count(&registry, &ids) == 5, "all 5 tasks terminal").await;

    let completed = task_ids
        .iter()
        .filter(|id| h.registry.is_completed(id))
        .count();
    assert_eq!(completed, 3);

    let exhausted = task_ids
        .iter()
        .filter_map(|id| h.registry.get(id))
        .filter(|r| {
            matches!(
                r.state,
                TaskState::Failed {
                    reason: ts_common::FailureReason::SeatsExhausted
                }
            )
        })
        .count();
    assert_eq!(exhausted, 2);

    assert_eq!(h.store.read_seats().await.unwrap(), 0);
    assert!(!h.gate.is_open());
}

#[tokio::test]
async fn single_reservation_leaves_forty_nine() {
    let h = harness(50);

    let SubmissionResult::Accepted { task_id } = h.service.submit().await else {
        panic!("expected Accepted");
    };

    h.runner.start();
    let registry = h.registry.clone();
    wait_until(|| registry.is_completed(&task_id), "task completed").await;

    assert_eq!(h.store.read_seats().await.unwrap(), 49);
    assert!(h.gate.is_open());
}

#[tokio::test]
async fn inventory_of_one_blocks_the_third_caller() {
    let h = harness(1);

    let SubmissionResult::Accepted { task_id: first } = h.service.submit().await else {
        panic!("expected Accepted");
    };
    let SubmissionResult::Accepted { task_id: second } = h.service.submit().await else {
        panic!("expected Accepted");
    };

    h.runner.start();
    let registry = h.registry.clone();
    let ids = vec![first.clone(), second.clone()];
    wait_until(|| terminal_count(&registry, &ids) == 2, "both tasks terminal").await;

    assert!(h.registry.is_completed(&first));
    let record = h.registry.get(&second).unwrap();
    assert!(matches!(
        record.state,
        TaskState::Failed {
            reason: ts_common::FailureReason::SeatsExhausted
        }
    ));
    assert_eq!(h.store.read_seats().await.unwrap(), 0);
    assert!(!h.gate.is_open());

    // Third submission is blocked at the gate, no task created
    assert_eq!(h.service.submit().await, SubmissionResult::Blocked);
    let metrics = h.queue.metrics().await.unwrap().unwrap();
    assert_eq!(metrics.pending_tasks, 0);
    assert_eq!(metrics.in_flight_tasks, 0);
}

#[tokio::test]
async fn redelivered_completed_task_does_not_double_decrement() {
    let h = harness(10);
    h.runner.start();

    // Publish the same task twice, simulating at-least-once redelivery
    let task = ReservationTask::new();
    h.queue.publish(task.clone()).await.unwrap();

    let runner = h.runner.clone();
    wait_until(|| runner.stats().tasks_processed == 1, "first delivery processed").await;
    assert_eq!(h.store.read_seats().await.unwrap(), 9);

    h.queue.publish(task.clone()).await.unwrap();
    wait_until(|| runner.stats().tasks_processed == 2, "second delivery processed").await;

    assert_eq!(h.store.read_seats().await.unwrap(), 9);
    assert!(h.registry.is_completed(&task.id));
}

#[tokio::test]
async fn start_is_one_shot() {
    let h = harness(2);
    h.runner.start();
    h.runner.start();
    h.runner.start();

    let SubmissionResult::Accepted { task_id } = h.service.submit().await else {
        panic!("expected Accepted");
    };
    let registry = h.registry.clone();
    wait_until(|| registry.is_completed(&task_id), "task completed").await;

    // A duplicated loop would race the counter; the decrement is exactly one
    assert_eq!(h.store.read_seats().await.unwrap(), 1);
    assert!(h.runner.is_running());
}

#[tokio::test]
async fn shutdown_stops_the_loop_and_the_queue() {
    let h = harness(5);
    h.runner.start();

    let runner = h.runner.clone();
    wait_until(|| runner.is_running(), "worker running").await;

    h.runner.shutdown().await;
    wait_until(|| !runner.is_running(), "worker stopped").await;

    // Queue is stopped with it; new submissions can no longer be queued
    assert_eq!(h.service.submit().await, SubmissionResult::SubmissionFailed);
}

#[tokio::test]
async fn store_outage_retries_without_closing_admission() {
    let h = harness(5);
    h.store.fail_reads(true);

    let SubmissionResult::Accepted { task_id } = h.service.submit().await else {
        panic!("expected Accepted");
    };

    h.runner.start();
    let runner = h.runner.clone();
    wait_until(|| runner.stats().tasks_failed >= 1, "first attempt failed").await;

    // Gate stays open during the outage, and the task stays redeliverable
    assert!(h.gate.is_open());
    assert!(!h.registry.is_completed(&task_id));

    // Store recovers; redelivery completes the reservation
    h.store.fail_reads(false);
    let registry = h.registry.clone();
    wait_until(|| registry.is_completed(&task_id), "task completed after recovery").await;
    assert_eq!(h.store.read_seats().await.unwrap(), 4);
}
