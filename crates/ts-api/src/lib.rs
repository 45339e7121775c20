//! Turnstile HTTP API
//!
//! Endpoints for:
//! - Seat availability queries
//! - Reservation submission and task status lookup
//! - Processing trigger (status acknowledgment; the worker itself is
//!   started exactly once at server startup)
//! - Admission reopen (operator hook)
//! - Health, probes, and monitoring

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{debug, error};

use ts_common::SubmissionResult;
use ts_store::SeatQuery;
use ts_worker::{AdmissionGate, ReservationService, TaskRegistry, WorkerRunner};

pub mod model;
use model::{
    AdmissionResponse, AvailableSeatsResponse, ErrorResponse, HealthResponse,
    MonitoringResponse, ProbeResponse, ProcessResponse, QueueMetricsResponse, ReserveResponse,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub query: SeatQuery,
    pub reservations: Arc<ReservationService>,
    pub registry: Arc<TaskRegistry>,
    pub gate: Arc<AdmissionGate>,
    pub runner: Arc<WorkerRunner>,
}

/// Create the full router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Reservation surface
        .route("/available_seats", get(available_seats))
        .route("/reserve_seat", get(reserve_seat))
        .route("/process", get(process_trigger))
        .route("/reservations/:task_id", get(reservation_status))
        // Operator hook
        .route("/admission/reopen", post(reopen_admission))
        // Health & monitoring
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/monitoring", get(monitoring_handler))
        .with_state(state)
}

// ============================================================================
// Reservation Endpoints
// ============================================================================

/// Current seat availability. Store errors surface as 500, not as a
/// fabricated count.
async fn available_seats(State(state): State<AppState>) -> Response {
    match state.query.available_seats().await {
        Ok(seats) => (
            StatusCode::OK,
            Json(AvailableSeatsResponse {
                available_seats: seats,
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to retrieve available seats");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to retrieve available seats".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Submit one seat reservation. The response acknowledges queueing only;
/// the outcome is asynchronous and queryable via the returned task id.
async fn reserve_seat(State(state): State<AppState>) -> Json<ReserveResponse> {
    let response = match state.reservations.submit().await {
        SubmissionResult::Accepted { task_id } => ReserveResponse {
            status: "Reservation in process",
            task_id: Some(task_id),
        },
        SubmissionResult::Blocked => ReserveResponse {
            status: "Reservations are blocked",
            task_id: None,
        },
        SubmissionResult::SubmissionFailed => ReserveResponse {
            status: "Reservation failed",
            task_id: None,
        },
    };

    Json(response)
}

/// Processing trigger. The worker loop is registered once at startup;
/// this endpoint only acknowledges that processing is active.
async fn process_trigger(State(state): State<AppState>) -> Json<ProcessResponse> {
    debug!(worker_running = state.runner.is_running(), "Process trigger");
    Json(ProcessResponse {
        status: "Queue processing",
        worker_running: state.runner.is_running(),
    })
}

/// Look up the status record of a submitted reservation task
async fn reservation_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Response {
    match state.registry.get(&task_id) {
        Some(record) => (StatusCode::OK, Json(record)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Task not found".to_string(),
            }),
        )
            .into_response(),
    }
}

// ============================================================================
// Operator Endpoints
// ============================================================================

/// Reopen admission after an operator has replenished the pool out of band
async fn reopen_admission(State(state): State<AppState>) -> Json<AdmissionResponse> {
    state.gate.reopen();
    Json(AdmissionResponse {
        admission_open: state.gate.is_open(),
    })
}

// ============================================================================
// Health Endpoints
// ============================================================================

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.runner.is_running() && state.runner.queue_healthy() {
        "UP"
    } else {
        "DEGRADED"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Liveness probe - 200 if the process is serving requests
async fn liveness_probe() -> (StatusCode, Json<ProbeResponse>) {
    (
        StatusCode::OK,
        Json(ProbeResponse {
            status: "LIVE".to_string(),
        }),
    )
}

/// Readiness probe - 200 only when the worker loop is running and the
/// counter store is reachable
async fn readiness_probe(State(state): State<AppState>) -> (StatusCode, Json<ProbeResponse>) {
    let ready = state.runner.is_running() && state.query.available_seats().await.is_ok();

    if ready {
        (
            StatusCode::OK,
            Json(ProbeResponse {
                status: "READY".to_string(),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ProbeResponse {
                status: "NOT_READY".to_string(),
            }),
        )
    }
}

// ============================================================================
// Monitoring
// ============================================================================

async fn monitoring_handler(State(state): State<AppState>) -> Json<MonitoringResponse> {
    let worker = state.runner.stats();
    let queue = state
        .runner
        .queue_metrics()
        .await
        .map(QueueMetricsResponse::from);

    let status = if worker.running && state.runner.queue_healthy() {
        "HEALTHY"
    } else {
        "DEGRADED"
    };

    Json(MonitoringResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        admission_open: state.gate.is_open(),
        available_seats: state.query.available_or_zero().await,
        worker,
        queue,
        registry_size: state.registry.len(),
    })
}
