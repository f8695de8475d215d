//! Fluent, validated assembly of a [`Scraper`].
//!
//! Every setter is infallible; validation happens once in `build`, which
//! compiles the filters, opens the catalog store, and wires the fetch
//! pipeline. The builder is consumed by `build`, so a built engine can
//! never observe later mutation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use super::types::{FailureStrategy, ScrapeConfig};
use crate::cache::ResponseCache;
use crate::catalog::{UrlCatalog, DEFAULT_CATALOG_PATH};
use crate::engine::{default_user_agent, Fetcher, ScrapePipeline, Scraper};
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::Extractor;
use crate::rate_limiter::{Limiter, MemoryStorage};
use crate::sink::{default_file_name, FileSink, Sink};

const DEFAULT_MAX_CONCURRENCY: usize = 10;
const DEFAULT_BURST: f64 = 100.0;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_MIN_IDLE_MS: u64 = 60_000;

/// Builder for a host-scoped [`Scraper`]
pub struct ScraperBuilder {
    host: Option<String>,
    qps: Option<f64>,
    burst: f64,
    max_concurrency: usize,
    strategy: FailureStrategy,
    filters: Vec<String>,
    user_agent: Option<String>,
    timeout: Duration,
    verify_tls: bool,
    progress: bool,
    catalog_path: PathBuf,
    redis_url: Option<String>,
    min_idle_ms: u64,
    extractor: Option<Arc<dyn Extractor>>,
    sink: Option<Box<dyn Sink>>,
    cache: Option<Arc<dyn ResponseCache>>,
}

impl Default for ScraperBuilder {
    fn default() -> Self {
        Self {
            host: None,
            qps: None,
            burst: DEFAULT_BURST,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            strategy: FailureStrategy::default(),
            filters: Vec::new(),
            user_agent: None,
            timeout: DEFAULT_TIMEOUT,
            verify_tls: true,
            progress: false,
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
            redis_url: None,
            min_idle_ms: DEFAULT_MIN_IDLE_MS,
            extractor: None,
            sink: None,
            cache: None,
        }
    }
}

impl ScraperBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Target host; every catalog key and limiter bucket scopes to it.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Steady-state request rate, in requests per second.
    #[must_use]
    pub fn qps(mut self, qps: f64) -> Self {
        self.qps = Some(qps);
        self
    }

    /// Token-bucket capacity (burst allowance).
    #[must_use]
    pub fn burst(mut self, burst: f64) -> Self {
        self.burst = burst;
        self
    }

    /// Upper bound on concurrently outstanding requests.
    #[must_use]
    pub fn max_concurrency(mut self, concurrency: usize) -> Self {
        self.max_concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn strategy(mut self, strategy: FailureStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Add one path filter regex. URLs whose path matches no filter are
    /// skipped.
    #[must_use]
    pub fn filter(mut self, pattern: impl Into<String>) -> Self {
        self.filters.push(pattern.into());
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Per-request total timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    #[must_use]
    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Directory of the catalog store.
    #[must_use]
    pub fn catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = path.into();
        self
    }

    /// Shared-store URL enabling distributed mode and the remote cache.
    #[must_use]
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    /// Idle threshold before a pending stream entry becomes claimable.
    #[must_use]
    pub fn min_idle_ms(mut self, min_idle_ms: u64) -> Self {
        self.min_idle_ms = min_idle_ms;
        self
    }

    #[must_use]
    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Response cache; when set, fetched bodies are compressed and stored
    /// instead of being extracted.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Validate and assemble the engine.
    pub fn build(self) -> ScrapeResult<Scraper> {
        let host = match self.host {
            Some(host) if !host.trim().is_empty() => host.trim().to_string(),
            _ => return Err(ScrapeError::Config("host is required".into())),
        };
        let qps = match self.qps {
            Some(qps) if qps > 0.0 && qps.is_finite() => qps,
            Some(qps) => {
                return Err(ScrapeError::Config(format!(
                    "qps must be a positive number, got {qps}"
                )))
            }
            None => return Err(ScrapeError::Config("qps is required".into())),
        };
        if self.max_concurrency == 0 {
            return Err(ScrapeError::Config("max concurrency must be at least 1".into()));
        }
        if self.burst <= 0.0 || !self.burst.is_finite() {
            return Err(ScrapeError::Config(format!(
                "burst must be positive, got {}",
                self.burst
            )));
        }

        let filters = self
            .filters
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| ScrapeError::Config(format!("invalid filter {p:?}: {e}")))
            })
            .collect::<ScrapeResult<Vec<_>>>()?;

        let config = ScrapeConfig {
            host,
            qps,
            burst: self.burst,
            max_concurrency: self.max_concurrency,
            strategy: self.strategy,
            filters,
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
            timeout: self.timeout,
            verify_tls: self.verify_tls,
            progress: self.progress,
            catalog_path: self.catalog_path,
            redis_url: self.redis_url,
            min_idle_ms: self.min_idle_ms,
        };

        let catalog = Arc::new(UrlCatalog::open(config.host(), config.catalog_path())?);
        let limiter = Arc::new(Limiter::new(
            config.qps(),
            config.burst(),
            Arc::new(MemoryStorage::new()),
        ));
        let fetcher = Fetcher::new(&config, limiter)?;

        // A run with an extractor and no explicit sink gets the
        // conventional per-host CSV file.
        let sink = match self.sink {
            Some(sink) => Some(sink),
            None if self.extractor.is_some() && self.cache.is_none() => {
                Some(Box::new(FileSink::new(default_file_name(config.host()))) as Box<dyn Sink>)
            }
            None => None,
        };

        let pipeline = Arc::new(ScrapePipeline::new(fetcher, self.cache, self.extractor, sink));
        Ok(Scraper::from_parts(config, catalog, pipeline))
    }
}
