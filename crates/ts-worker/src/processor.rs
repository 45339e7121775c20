//! Reservation processor - the check-then-act sequence against the
//! counter store.
//!
//! Correctness of "never over-sell" rests on the caller's serialization
//! contract: no two `process` calls may overlap in time. The runner
//! enforces that structurally by awaiting each task before polling the
//! next; the processor itself takes no lock.

use std::sync::Arc;

use tracing::{info, warn};

use ts_common::{FailureReason, ReservationTask, TaskOutcome};
use ts_store::SeatStore;

use crate::gate::AdmissionGate;
use crate::registry::TaskRegistry;

pub struct ReservationProcessor {
    store: Arc<dyn SeatStore>,
    gate: Arc<AdmissionGate>,
    registry: Arc<TaskRegistry>,
}

impl ReservationProcessor {
    pub fn new(
        store: Arc<dyn SeatStore>,
        gate: Arc<AdmissionGate>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        Self {
            store,
            gate,
            registry,
        }
    }

    /// Process one reservation task: consume one seat or report why not.
    ///
    /// At most one decrement per task id, ever: a redelivered task whose
    /// registry record is already completed returns `Completed` without
    /// touching the store.
    pub async fn process(&self, task: &ReservationTask) -> TaskOutcome {
        if self.registry.is_completed(&task.id) {
            info!(task_id = %task.id, "Task already completed, skipping decrement");
            return TaskOutcome::Completed;
        }

        let seats = match self.store.read_seats().await {
            Ok(seats) => seats,
            Err(e) => {
                // Unreadable store is not exhaustion; leave the gate alone
                // and let the queue redeliver.
                warn!(task_id = %task.id, error = %e, "Seat count unreadable, task will be retried");
                return TaskOutcome::Failed(FailureReason::StoreRead {
                    detail: e.to_string(),
                });
            }
        };

        if seats == 0 {
            self.gate.close();
            info!(task_id = %task.id, "No seats available");
            return TaskOutcome::Failed(FailureReason::SeatsExhausted);
        }

        match self.store.write_seats(seats - 1).await {
            Ok(()) => {
                info!(task_id = %task.id, seats_left = seats - 1, "Seat reserved");
                TaskOutcome::Completed
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Decrement write failed, task will be retried");
                TaskOutcome::Failed(FailureReason::StoreWrite {
                    detail: e.to_string(),
                })
            }
        }
    }
}
