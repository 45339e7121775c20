//! Read-only accessor for the available-seat count.

use std::sync::Arc;

use tracing::warn;

use crate::{Result, SeatStore};

/// Read-only view of the counter, shared by the HTTP layer and the worker.
///
/// Callers choose how to treat an unreadable store: `available_seats`
/// surfaces the error, `available_or_zero` degrades to the conservative 0
/// (the pool appears exhausted, which can never over-sell).
#[derive(Clone)]
pub struct SeatQuery {
    store: Arc<dyn SeatStore>,
}

impl SeatQuery {
    pub fn new(store: Arc<dyn SeatStore>) -> Self {
        Self { store }
    }

    /// Current counter value. No side effects.
    pub async fn available_seats(&self) -> Result<u64> {
        self.store.read_seats().await
    }

    /// Current counter value, degraded to 0 when the store is unreadable
    pub async fn available_or_zero(&self) -> u64 {
        match self.store.read_seats().await {
            Ok(seats) => seats,
            Err(e) => {
                warn!(store = %self.store.identifier(), error = %e, "Seat count unreadable, reporting 0");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySeatStore;

    #[tokio::test]
    async fn reports_stored_value() {
        let store = Arc::new(MemorySeatStore::default());
        store.write_seats(50).await.unwrap();

        let query = SeatQuery::new(store);
        assert_eq!(query.available_seats().await.unwrap(), 50);
        assert_eq!(query.available_or_zero().await, 50);
    }

    #[tokio::test]
    async fn degrades_to_zero_on_read_failure() {
        let store = Arc::new(MemorySeatStore::default());
        store.write_seats(50).await.unwrap();
        store.fail_reads(true);

        let query = SeatQuery::new(store);
        assert!(query.available_seats().await.is_err());
        assert_eq!(query.available_or_zero().await, 0);
    }

    #[tokio::test]
    async fn degrades_to_zero_on_malformed_value() {
        let store = Arc::new(MemorySeatStore::default());
        store.set_raw("not-a-number");

        let query = SeatQuery::new(store);
        assert!(query.available_seats().await.is_err());
        assert_eq!(query.available_or_zero().await, 0);
    }
}
