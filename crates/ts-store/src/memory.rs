//! In-process counter store for tests and local development.
//!
//! Holds the raw string value so tests can inject malformed data, and
//! carries failure switches to simulate an unreachable store.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{Result, SeatStore, StoreError};

pub struct MemorySeatStore {
    key: String,
    value: RwLock<Option<String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemorySeatStore {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            value: RwLock::new(None),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Set the raw stored string, bypassing integer encoding
    pub fn set_raw(&self, raw: &str) {
        *self.value.write() = Some(raw.to_string());
    }

    /// Clear the stored value, as if the key was never set
    pub fn clear(&self) {
        *self.value.write() = None;
    }

    /// Make subsequent reads fail as if the store were unreachable
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes fail as if the store were unreachable
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl Default for MemorySeatStore {
    fn default() -> Self {
        Self::new("available_seats")
    }
}

#[async_trait]
impl SeatStore for MemorySeatStore {
    fn identifier(&self) -> &str {
        "memory"
    }

    async fn read_seats(&self) -> Result<u64> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("simulated read failure".to_string()));
        }

        let guard = self.value.read();
        let raw = guard.as_ref().ok_or_else(|| StoreError::Missing {
            key: self.key.clone(),
        })?;

        raw.trim().parse::<u64>().map_err(|_| StoreError::Malformed {
            key: self.key.clone(),
            value: raw.clone(),
        })
    }

    async fn write_seats(&self, seats: u64) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("simulated write failure".to_string()));
        }

        *self.value.write() = Some(seats.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_counter_value() {
        let store = MemorySeatStore::default();
        store.write_seats(50).await.unwrap();
        assert_eq!(store.read_seats().await.unwrap(), 50);
    }

    #[tokio::test]
    async fn missing_key_is_an_error() {
        let store = MemorySeatStore::default();
        assert!(matches!(
            store.read_seats().await,
            Err(StoreError::Missing { .. })
        ));
    }

    #[tokio::test]
    async fn malformed_value_is_an_error() {
        let store = MemorySeatStore::default();
        store.set_raw("fifty");
        assert!(matches!(
            store.read_seats().await,
            Err(StoreError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn simulated_outage_fails_reads_and_writes() {
        let store = MemorySeatStore::default();
        store.write_seats(10).await.unwrap();

        store.fail_reads(true);
        store.fail_writes(true);
        assert!(matches!(
            store.read_seats().await,
            Err(StoreError::Connection(_))
        ));
        assert!(matches!(
            store.write_seats(9).await,
            Err(StoreError::Connection(_))
        ));

        store.fail_reads(false);
        assert_eq!(store.read_seats().await.unwrap(), 10);
    }
}
