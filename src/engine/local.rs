//! Local catalog-driven scraping engine.
//!
//! `scrape` walks the catalog from the persisted cursor, fans each URL out
//! to a bounded task pool, and advances the cursor through a low-watermark
//! so a restart never skips an unfinished URL. The cursor moves on every
//! terminal outcome, success or failure; only keys the path filter skips
//! stay outside the watermark entirely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use super::fetch::ScrapePipeline;
use super::progress::ScrapeProgress;
use super::watermark::Watermark;
use crate::catalog::{split_path_query, UrlCatalog};
use crate::config::{FailureStrategy, ScrapeConfig};
use crate::discovery;
use crate::error::{ScrapeError, ScrapeResult};
use crate::stream::{StreamConsumer, StreamDispatcher};

/// Host-scoped fetch engine. Built through
/// [`ScraperBuilder`](crate::config::ScraperBuilder).
pub struct Scraper {
    config: ScrapeConfig,
    catalog: Arc<UrlCatalog>,
    pipeline: Arc<ScrapePipeline>,
    running: Arc<AtomicBool>,
}

impl std::fmt::Debug for Scraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scraper")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Scraper {
    pub(crate) fn from_parts(
        config: ScrapeConfig,
        catalog: Arc<UrlCatalog>,
        pipeline: Arc<ScrapePipeline>,
    ) -> Self {
        Self {
            config,
            catalog,
            pipeline,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &UrlCatalog {
        &self.catalog
    }

    /// Add one URL to this host's catalog.
    pub fn enqueue(&self, url: &str) -> ScrapeResult<()> {
        self.catalog.add(url)
    }

    /// Cooperatively stop the run: no new tasks start, in-flight tasks
    /// drain and still record their terminal outcome.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Resolve the host's sitemap and ingest every URL that passes the
    /// path filter. Returns how many URLs were added.
    pub async fn discover_from_sitemap(&self) -> ScrapeResult<usize> {
        let homepage = format!("https://{}", self.config.host());
        self.ingest_sitemap(&homepage).await
    }

    /// Like [`discover_from_sitemap`](Self::discover_from_sitemap), but
    /// resolving the sitemap under an explicit homepage.
    pub async fn ingest_sitemap(&self, homepage: &str) -> ScrapeResult<usize> {
        let urls = discovery::sitemap_urls(self.pipeline.fetcher().client(), homepage).await?;
        let mut added = 0;
        for url in urls {
            let (path, _) = split_path_query(&url);
            if self.config.path_allowed(&path) {
                self.catalog.add(&url)?;
                added += 1;
            }
        }
        Ok(added)
    }

    /// Publish this host's catalog onto the durable stream.
    pub async fn stream_dispatcher(&self) -> ScrapeResult<StreamDispatcher> {
        StreamDispatcher::connect(self.redis_url()?, Arc::clone(&self.catalog)).await
    }

    /// Join the consumer group for this host's stream. `name` overrides the
    /// default `<hostname>:<pid>` consumer id.
    pub async fn stream_consumer(&self, name: Option<String>) -> ScrapeResult<StreamConsumer> {
        StreamConsumer::new(
            self.redis_url()?,
            self.config.clone(),
            Arc::clone(&self.pipeline),
            name,
        )
        .await
    }

    fn redis_url(&self) -> ScrapeResult<&str> {
        self.config
            .redis_url()
            .ok_or_else(|| ScrapeError::Config("distributed mode requires a redis URL".into()))
    }

    /// Run the engine over the catalog until it drains or a stop triggers.
    pub async fn scrape(&self) -> ScrapeResult<()> {
        if self.catalog.get_cursor()? == self.catalog.upper() {
            self.catalog.set_cursor(None)?;
        }
        let cursor = self.catalog.get_cursor()?;
        self.running.store(true, Ordering::SeqCst);

        let progress = Arc::new(ScrapeProgress::new(
            self.config.progress(),
            self.catalog.total()? as u64,
            self.catalog.current_index()? as u64,
            self.config.host(),
        ));

        // Materialize the pending slice up front: workers complete out of
        // order, and the watermark needs registration in start order.
        let mut pending: Vec<(Vec<u8>, String)> = Vec::new();
        if cursor == self.catalog.lower() {
            for entry in self.catalog.iterate(None) {
                pending.push(entry?);
            }
        } else {
            for entry in self.catalog.iterate_after(&cursor) {
                pending.push(entry?);
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency()));
        let watermark = Arc::new(Watermark::new());
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut stopped = false;

        for (key, url) in pending {
            let (path, _) = split_path_query(&url);
            if !self.config.path_allowed(&path) {
                continue;
            }
            let url = self.pipeline.fetcher().absolutize(&url);

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            // Re-check after waiting for a slot: a failure that triggered a
            // stop while we were blocked must not start new work.
            if !self.running.load(Ordering::SeqCst) {
                stopped = true;
                break;
            }
            watermark.register(key.clone());
            tasks.spawn(scrape_one(
                Arc::clone(&self.pipeline),
                Arc::clone(&self.catalog),
                Arc::clone(&watermark),
                Arc::clone(&progress),
                Arc::clone(&self.running),
                self.config.strategy(),
                key,
                url,
                permit,
            ));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "scrape task panicked");
            }
        }
        progress.finish();
        self.pipeline.close_sink()?;

        // A naturally drained run starts over from the top next time.
        if !stopped && self.running.load(Ordering::SeqCst) {
            self.catalog.set_cursor(None)?;
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn scrape_one(
    pipeline: Arc<ScrapePipeline>,
    catalog: Arc<UrlCatalog>,
    watermark: Arc<Watermark>,
    progress: Arc<ScrapeProgress>,
    running: Arc<AtomicBool>,
    strategy: FailureStrategy,
    key: Vec<u8>,
    url: String,
    _permit: OwnedSemaphorePermit,
) {
    match pipeline.process(&url).await {
        Ok(()) => tracing::debug!(url = %url, "fetched"),
        Err(e) if e.is_fatal() => {
            tracing::error!(url = %url, error = %e, "storage failure; stopping engine");
            running.store(false, Ordering::SeqCst);
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "fetch failed");
            if strategy == FailureStrategy::StopOnFail && e.stops_engine() {
                running.store(false, Ordering::SeqCst);
            }
        }
    }

    if let Some(mark) = watermark.complete(&key) {
        if let Err(e) = catalog.set_cursor(Some(&mark)) {
            tracing::error!(error = %e, "failed to persist cursor; stopping engine");
            running.store(false, Ordering::SeqCst);
        }
    }
    progress.tick();
}
