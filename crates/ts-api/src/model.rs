//! API request/response types

use serde::Serialize;

use ts_common::WorkerStats;
use ts_queue::QueueMetrics;

#[derive(Serialize)]
pub struct AvailableSeatsResponse {
    pub available_seats: u64,
}

/// Immediate acknowledgment for a reserve request. `task_id` is present
/// only when the task was accepted, and keys the status lookup endpoint.
#[derive(Serialize)]
pub struct ReserveResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

#[derive(Serialize)]
pub struct ProcessResponse {
    pub status: &'static str,
    pub worker_running: bool,
}

#[derive(Serialize)]
pub struct AdmissionResponse {
    pub admission_open: bool,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    /// Health status: UP, DEGRADED
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ProbeResponse {
    /// Probe status: LIVE, READY, NOT_READY
    pub status: String,
}

#[derive(Serialize)]
pub struct QueueMetricsResponse {
    pub queue_identifier: String,
    pub pending_tasks: u64,
    pub in_flight_tasks: u64,
}

impl From<QueueMetrics> for QueueMetricsResponse {
    fn from(m: QueueMetrics) -> Self {
        Self {
            queue_identifier: m.queue_identifier,
            pending_tasks: m.pending_tasks,
            in_flight_tasks: m.in_flight_tasks,
        }
    }
}

#[derive(Serialize)]
pub struct MonitoringResponse {
    /// Overall status: HEALTHY, DEGRADED
    pub status: String,
    pub version: String,
    pub admission_open: bool,
    pub available_seats: u64,
    pub worker: WorkerStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueMetricsResponse>,
    pub registry_size: usize,
}
