//! Consumer-group worker: claim, fetch, ack.
//!
//! A run has two phases. Recovery sweeps the stream with XAUTOCLAIM,
//! adopting entries another worker delivered but never acked once they have
//! been idle past the threshold. Steady state reads new entries with
//! XREADGROUP `>` in small blocking batches. In both phases an entry is
//! acked only after its fetch succeeded; a failed fetch leaves the entry
//! pending for a later reclaim cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamReadOptions, StreamReadReply,
};
use redis::AsyncCommands;

use super::{stream_key, CONSUMER_GROUP};
use crate::catalog::split_path_query;
use crate::config::{FailureStrategy, ScrapeConfig};
use crate::engine::ScrapePipeline;
use crate::error::{ScrapeError, ScrapeResult};

/// Entries reclaimed per XAUTOCLAIM batch
const CLAIM_BATCH: usize = 100;
/// New entries read per XREADGROUP call
const READ_COUNT: usize = 10;
/// Blocking read timeout; an empty read after this long ends the run
const READ_BLOCK_MS: usize = 5_000;

/// One worker in the `scrapers` consumer group
pub struct StreamConsumer {
    conn: MultiplexedConnection,
    pipeline: Arc<ScrapePipeline>,
    config: ScrapeConfig,
    stream: String,
    consumer: String,
    running: AtomicBool,
}

impl StreamConsumer {
    /// Connect and make sure the consumer group exists, creating the stream
    /// along with it when absent. A pre-existing group is not an error.
    pub async fn new(
        redis_url: &str,
        config: ScrapeConfig,
        pipeline: Arc<ScrapePipeline>,
        name: Option<String>,
    ) -> ScrapeResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let stream = stream_key(config.host());

        let created: Result<String, redis::RedisError> = conn
            .xgroup_create_mkstream(&stream, CONSUMER_GROUP, "$")
            .await;
        match created {
            Ok(_) => {}
            Err(e) if e.code() == Some("BUSYGROUP") => {}
            Err(e) => return Err(e.into()),
        }

        let consumer = name.unwrap_or_else(default_consumer_name);
        Ok(Self {
            conn,
            pipeline,
            config,
            stream,
            consumer,
            running: AtomicBool::new(true),
        })
    }

    #[must_use]
    pub fn consumer_name(&self) -> &str {
        &self.consumer
    }

    #[must_use]
    pub fn stream_name(&self) -> &str {
        &self.stream
    }

    /// Recover abandoned entries, then consume new ones until the stream
    /// goes quiet or a stop triggers.
    pub async fn scrape(&self) -> ScrapeResult<()> {
        self.running.store(true, Ordering::SeqCst);
        self.recover().await?;
        if self.running.load(Ordering::SeqCst) {
            self.run_steady().await?;
        }
        self.pipeline.close_sink()?;
        Ok(())
    }

    /// Sweep the pending entries list, adopting anything idle past the
    /// configured threshold.
    async fn recover(&self) -> ScrapeResult<()> {
        let mut start = "0-0".to_string();
        loop {
            let options = StreamAutoClaimOptions::default().count(CLAIM_BATCH);
            let reply: StreamAutoClaimReply = self
                .conn
                .clone()
                .xautoclaim_options(
                    &self.stream,
                    CONSUMER_GROUP,
                    &self.consumer,
                    self.config.min_idle_ms(),
                    &start,
                    options,
                )
                .await?;

            let next = reply.next_stream_id.clone();
            let reclaimed = reply.claimed.len();
            if reclaimed > 0 {
                tracing::info!(
                    consumer = %self.consumer,
                    count = reclaimed,
                    "reclaimed idle entries"
                );
            }
            for entry in reply.claimed {
                if !self.handle_entry(entry).await? {
                    return Ok(());
                }
            }
            // XAUTOCLAIM returns "0-0" once the sweep wrapped around.
            if next == "0-0" {
                return Ok(());
            }
            start = next;
        }
    }

    async fn run_steady(&self) -> ScrapeResult<()> {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return Ok(());
            }
            let options = StreamReadOptions::default()
                .group(CONSUMER_GROUP, &self.consumer)
                .count(READ_COUNT)
                .block(READ_BLOCK_MS);
            let reply: Option<StreamReadReply> = self
                .conn
                .clone()
                .xread_options(&[&self.stream], &[">"], &options)
                .await?;

            let mut delivered = false;
            if let Some(reply) = reply {
                for key in reply.keys {
                    for entry in key.ids {
                        delivered = true;
                        if !self.handle_entry(entry).await? {
                            return Ok(());
                        }
                    }
                }
            }
            // Block expired with nothing new: the stream is drained.
            if !delivered {
                return Ok(());
            }
        }
    }

    /// Process one delivered entry. Returns `false` when the worker should
    /// stop. The broker side effects follow [`entry_action`]; an ack marks
    /// a terminal state, and a failed fetch stays pending so another
    /// worker can reclaim it.
    async fn handle_entry(&self, entry: StreamId) -> ScrapeResult<bool> {
        let id = entry.id.clone();
        let url = entry.get::<String>("url");

        match entry_action(url.as_deref(), &self.config, None) {
            EntryAction::AckPoison => {
                tracing::warn!(id = %id, "entry without url field; acking as poison");
                self.ack(&id).await?;
                return Ok(true);
            }
            EntryAction::Ack => {
                // Filtered out before the fetch; terminal for this
                // deployment.
                self.ack(&id).await?;
                return Ok(true);
            }
            _ => {}
        }

        let url = self
            .pipeline
            .fetcher()
            .absolutize(url.as_deref().unwrap_or_default());
        let outcome = self.pipeline.process(&url).await;

        match entry_action(Some(&url), &self.config, Some(&outcome)) {
            EntryAction::Ack => {
                self.ack(&id).await?;
                Ok(true)
            }
            EntryAction::LeavePending => {
                if let Err(e) = &outcome {
                    tracing::warn!(url = %url, id = %id, error = %e, "fetch failed; entry stays pending");
                }
                Ok(true)
            }
            EntryAction::Stop => {
                if let Err(e) = &outcome {
                    tracing::warn!(url = %url, id = %id, error = %e, "fetch failed; stopping worker");
                }
                self.running.store(false, Ordering::SeqCst);
                Ok(false)
            }
            EntryAction::PropagateFatal => outcome.map(|()| true),
            // A fetch outcome never maps back to these.
            EntryAction::AckPoison | EntryAction::Fetch => Ok(true),
        }
    }

    async fn ack(&self, id: &str) -> ScrapeResult<()> {
        let _acked: i64 = self
            .conn
            .clone()
            .xack(&self.stream, CONSUMER_GROUP, &[id])
            .await
            .map_err(ScrapeError::from)?;
        Ok(())
    }
}

/// Terminal handling for one delivered entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryAction {
    /// Entry passed the gate; fetch it and decide again with the outcome
    Fetch,
    /// Acknowledge: the entry reached a terminal state
    Ack,
    /// Acknowledge a malformed entry so it never redelivers
    AckPoison,
    /// Leave the entry pending for a later reclaim cycle
    LeavePending,
    /// Leave pending and halt this worker
    Stop,
    /// Storage failure: abort the run
    PropagateFatal,
}

/// Pure decision table for one delivered entry; needs no broker
/// connection. `outcome` is `None` before the fetch. Entries that never
/// reach the fetch still get a terminal action here: a missing `url` field
/// acks as poison, and a filtered path acks outright (left pending it
/// would re-deliver on every recovery sweep).
fn entry_action(
    url: Option<&str>,
    config: &ScrapeConfig,
    outcome: Option<&ScrapeResult<()>>,
) -> EntryAction {
    let Some(url) = url else {
        return EntryAction::AckPoison;
    };
    let (path, _) = split_path_query(url);
    if !config.path_allowed(&path) {
        return EntryAction::Ack;
    }
    match outcome {
        None => EntryAction::Fetch,
        Some(Ok(())) => EntryAction::Ack,
        Some(Err(e)) if e.is_fatal() => EntryAction::PropagateFatal,
        Some(Err(e)) if config.strategy() == FailureStrategy::StopOnFail && e.stops_engine() => {
            EntryAction::Stop
        }
        Some(Err(_)) => EntryAction::LeavePending,
    }
}

/// Default consumer id: `<hostname>:<pid>`.
#[must_use]
pub fn default_consumer_name() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "worker".to_string());
    format!("{host}:{}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config(strategy: FailureStrategy, filters: &[&str]) -> ScrapeConfig {
        ScrapeConfig {
            host: "example.com".to_string(),
            qps: 10.0,
            burst: 100.0,
            max_concurrency: 10,
            strategy,
            filters: filters.iter().map(|p| Regex::new(p).unwrap()).collect(),
            user_agent: "test-agent".to_string(),
            timeout: Duration::from_secs(15),
            verify_tls: true,
            progress: false,
            catalog_path: PathBuf::from("."),
            redis_url: None,
            min_idle_ms: 60_000,
        }
    }

    fn http_error() -> ScrapeError {
        ScrapeError::Http {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            url: "https://example.com/x".to_string(),
        }
    }

    #[test]
    fn missing_url_acks_as_poison() {
        let cfg = config(FailureStrategy::NeverStop, &[]);
        assert_eq!(entry_action(None, &cfg, None), EntryAction::AckPoison);
    }

    #[test]
    fn filtered_entry_acks_without_fetching() {
        let cfg = config(FailureStrategy::NeverStop, &["^/(blog|news)/"]);
        assert_eq!(
            entry_action(Some("https://example.com/wp-admin"), &cfg, None),
            EntryAction::Ack
        );
    }

    #[test]
    fn unfiltered_entry_proceeds_to_the_fetch() {
        let cfg = config(FailureStrategy::NeverStop, &["^/(blog|news)/"]);
        assert_eq!(
            entry_action(Some("https://example.com/blog/a"), &cfg, None),
            EntryAction::Fetch
        );
    }

    #[test]
    fn successful_fetch_acks() {
        let cfg = config(FailureStrategy::NeverStop, &[]);
        assert_eq!(
            entry_action(Some("https://example.com/x"), &cfg, Some(&Ok(()))),
            EntryAction::Ack
        );
    }

    #[test]
    fn failure_under_never_stop_stays_pending() {
        let cfg = config(FailureStrategy::NeverStop, &[]);
        let outcome = Err(http_error());
        assert_eq!(
            entry_action(Some("https://example.com/x"), &cfg, Some(&outcome)),
            EntryAction::LeavePending
        );
    }

    #[test]
    fn failure_under_stop_on_fail_halts_the_worker() {
        let cfg = config(FailureStrategy::StopOnFail, &[]);
        let outcome = Err(http_error());
        assert_eq!(
            entry_action(Some("https://example.com/x"), &cfg, Some(&outcome)),
            EntryAction::Stop
        );
    }

    #[test]
    fn extractor_failure_never_halts_the_worker() {
        let cfg = config(FailureStrategy::StopOnFail, &[]);
        let outcome = Err(ScrapeError::Extract {
            url: "https://example.com/x".to_string(),
            message: "bad html".to_string(),
        });
        assert_eq!(
            entry_action(Some("https://example.com/x"), &cfg, Some(&outcome)),
            EntryAction::LeavePending
        );
    }

    #[test]
    fn storage_failure_propagates() {
        let cfg = config(FailureStrategy::NeverStop, &[]);
        let outcome = Err(ScrapeError::Stream(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "broker unreachable",
        ))));
        assert_eq!(
            entry_action(Some("https://example.com/x"), &cfg, Some(&outcome)),
            EntryAction::PropagateFatal
        );
    }

    #[test]
    fn consumer_name_carries_the_pid() {
        let name = default_consumer_name();
        let pid = std::process::id().to_string();
        assert!(name.ends_with(&format!(":{pid}")));
    }
}
