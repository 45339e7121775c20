//! Turnstile reservation worker
//!
//! This crate provides the admission-control core:
//! - AdmissionGate: process-wide flag gating new submissions
//! - TaskRegistry: per-task status records and the idempotency marker set
//! - ReservationProcessor: the serialized check-then-act against the store
//! - WorkerRunner: the single consumer loop (one task at a time)
//! - ReservationService: the fire-and-forget submission path
//! - LifecycleManager: background registry pruning

pub mod gate;
pub mod lifecycle;
pub mod processor;
pub mod registry;
pub mod runner;
pub mod submission;

pub use gate::AdmissionGate;
pub use lifecycle::{LifecycleConfig, LifecycleManager};
pub use processor::ReservationProcessor;
pub use registry::TaskRegistry;
pub use runner::WorkerRunner;
pub use submission::ReservationService;
