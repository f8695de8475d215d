//! Remote key/value cache on a shared Redis instance.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::ResponseCache;
use crate::error::ScrapeResult;

/// Cache backed by plain SET/GET against a shared store
pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl RedisCache {
    #[must_use]
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// Connect to `url` and wrap the connection.
    pub async fn connect(url: &str) -> ScrapeResult<Self> {
        let client = redis::Client::open(url).map_err(crate::error::ScrapeError::from)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl ResponseCache for RedisCache {
    async fn read(&self, key: &str) -> ScrapeResult<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> = self.conn.clone().get(key).await?;
        Ok(value)
    }

    async fn write(&self, key: &str, value: &[u8]) -> ScrapeResult<()> {
        let () = self.conn.clone().set(key, value).await?;
        Ok(())
    }
}
