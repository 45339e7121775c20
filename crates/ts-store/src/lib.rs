//! Counter store for Turnstile
//!
//! The available-seat count lives in an external key-value store as a
//! string-encoded integer. This crate provides:
//! - SeatStore: the store trait (read/write one non-negative counter)
//! - RedisSeatStore: production implementation over a Redis key
//! - MemorySeatStore: in-process implementation for tests and local dev
//! - SeatQuery: read-only accessor that distinguishes "0 seats" from
//!   "store unreadable"

pub mod memory;
pub mod query;
pub mod redis;

pub use memory::MemorySeatStore;
pub use query::SeatQuery;
pub use self::redis::RedisSeatStore;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Connection(String),

    #[error("counter key '{key}' is not set")]
    Missing { key: String },

    #[error("counter key '{key}' holds a non-integer value: '{value}'")]
    Malformed { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable holder of the available-seat counter.
///
/// The counter is owned exclusively by the store; callers never cache it
/// beyond the scope of a single operation. Apart from the one-time seed at
/// startup, only the reservation worker writes it.
#[async_trait]
pub trait SeatStore: Send + Sync {
    fn identifier(&self) -> &str;

    /// Read and parse the current counter value
    async fn read_seats(&self) -> Result<u64>;

    /// Overwrite the counter value
    async fn write_seats(&self, seats: u64) -> Result<()>;
}
