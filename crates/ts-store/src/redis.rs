//! Redis-backed counter store.
//!
//! The counter is a single string-encoded integer under a configurable key,
//! accessed through a shared async connection manager.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::{Result, SeatStore, StoreError};

pub struct RedisSeatStore {
    conn: ConnectionManager,
    key: String,
    identifier: String,
}

impl RedisSeatStore {
    /// Connect to Redis and bind the store to `key`.
    pub async fn connect(redis_url: &str, key: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            conn,
            key: key.to_string(),
            identifier: format!("redis:{}", key),
        })
    }
}

#[async_trait]
impl SeatStore for RedisSeatStore {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn read_seats(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(&self.key)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let raw = raw.ok_or_else(|| StoreError::Missing {
            key: self.key.clone(),
        })?;

        raw.trim().parse::<u64>().map_err(|_| StoreError::Malformed {
            key: self.key.clone(),
            value: raw,
        })
    }

    async fn write_seats(&self, seats: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(&self.key, seats.to_string())
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        debug!(key = %self.key, seats = seats, "Counter written");
        Ok(())
    }
}
