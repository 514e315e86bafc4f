//! Redis cache adapter.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::{Result, ToInternal};
use crate::ports::CachePort;

/// Cache backed by a Redis connection manager.
///
/// The manager reconnects on its own; cloning it is cheap.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis at `address` (e.g. `redis://127.0.0.1/`).
    pub async fn connect(address: &str) -> Result<Self> {
        let client = redis::Client::open(address).catch()?;
        let conn = ConnectionManager::new(client).await.catch()?;

        tracing::info!(%address, "redis connected");

        Ok(Self { conn })
    }
}

#[async_trait]
impl CachePort for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<Vec<u8>>>(key).await.catch()
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await.catch()
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        conn.expire::<_, ()>(key, seconds).await.catch()
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.catch()
    }
}
