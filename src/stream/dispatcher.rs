//! One-shot producer: catalog → durable stream.

use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::stream_key;
use crate::catalog::UrlCatalog;
use crate::error::ScrapeResult;

/// Publishes a host's catalog onto its stream. Duplicates are tolerated by
/// consumers through ack semantics, so re-dispatching is harmless.
pub struct StreamDispatcher {
    conn: MultiplexedConnection,
    catalog: Arc<UrlCatalog>,
    stream: String,
}

impl StreamDispatcher {
    /// Connect to the broker at `redis_url` for `catalog`'s host.
    pub async fn connect(redis_url: &str, catalog: Arc<UrlCatalog>) -> ScrapeResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        let stream = stream_key(catalog.host());
        Ok(Self {
            conn,
            catalog,
            stream,
        })
    }

    #[must_use]
    pub fn stream_name(&self) -> &str {
        &self.stream
    }

    /// Append every cataloged URL as a `{url}` entry. Returns the number of
    /// entries produced.
    pub async fn start_stream(&self) -> ScrapeResult<u64> {
        let mut urls = Vec::new();
        for entry in self.catalog.iterate(None) {
            let (_, url) = entry?;
            urls.push(url);
        }

        let mut conn = self.conn.clone();
        let mut produced = 0;
        for url in urls {
            let _id: String = conn
                .xadd(&self.stream, "*", &[("url", url.as_str())])
                .await?;
            produced += 1;
        }
        Ok(produced)
    }
}
