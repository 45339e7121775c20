//! Admission gate - process-wide flag gating new reservation submissions.
//!
//! The gate is a coarse fast-fail signal: once the worker observes an
//! exhausted pool it closes the gate so the submission path stops flooding
//! the queue with tasks guaranteed to fail. It does not itself prevent
//! over-selling; the worker's serialized check-then-act does.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

/// Open by default at startup. Closed only by the reservation worker on
/// exhaustion; reopened only by an explicit operator action. Never resets
/// automatically.
pub struct AdmissionGate {
    open: AtomicBool,
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Close the gate. Idempotent; logs the transition once.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            info!("Admission closed: seat pool exhausted");
        }
    }

    /// Operator hook: reopen the gate. Idempotent. Does not replenish the
    /// counter.
    pub fn reopen(&self) {
        if !self.open.swap(true, Ordering::SeqCst) {
            info!("Admission reopened by operator");
        }
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}
