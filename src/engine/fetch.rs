//! Shared HTTP fetch primitive and the per-URL processing pipeline.
//!
//! Both the local engine and the stream consumer fetch through the same
//! [`ScrapePipeline`]: admit through the limiter, GET with browser headers,
//! then route the body to the cache or to the extractor and sink.

use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Client;

use super::headers::browser_headers;
use crate::cache::{self, ResponseCache};
use crate::config::ScrapeConfig;
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::Extractor;
use crate::rate_limiter::Limiter;
use crate::sink::Sink;

/// Rate-limited HTTP client scoped to one host
pub struct Fetcher {
    client: Client,
    limiter: Arc<Limiter>,
    host: String,
}

impl Fetcher {
    pub fn new(config: &ScrapeConfig, limiter: Arc<Limiter>) -> ScrapeResult<Self> {
        let headers = browser_headers(config.user_agent())?;
        let mut builder = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .pool_max_idle_per_host(config.max_concurrency());
        if !config.verify_tls() {
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            client: builder.build()?,
            limiter,
            host: config.host().to_string(),
        })
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Rewrite scheme-relative or path-only URLs onto the configured host.
    #[must_use]
    pub fn absolutize(&self, url: &str) -> String {
        if url.starts_with("http") {
            url.to_string()
        } else {
            format!("https://{}{}", self.host, url)
        }
    }

    /// Admit through the limiter, then GET with redirects followed. Returns
    /// the body on 2xx; any other status is an error.
    pub async fn fetch(&self, url: &str) -> ScrapeResult<String> {
        self.limiter.acquire(&self.host).await;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Http {
                status,
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Fetch plus the terminal routing for one URL
pub struct ScrapePipeline {
    fetcher: Fetcher,
    cache: Option<Arc<dyn ResponseCache>>,
    extractor: Option<Arc<dyn Extractor>>,
    sink: Option<Arc<Mutex<Box<dyn Sink>>>>,
}

impl ScrapePipeline {
    pub(crate) fn new(
        fetcher: Fetcher,
        cache: Option<Arc<dyn ResponseCache>>,
        extractor: Option<Arc<dyn Extractor>>,
        sink: Option<Box<dyn Sink>>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            extractor,
            sink: sink.map(|s| Arc::new(Mutex::new(s))),
        }
    }

    #[must_use]
    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Fetch one URL and route its body. With a cache configured the body
    /// is compressed and stored; otherwise the extractor's record goes to
    /// the sink. Extractor failures are logged and swallowed here — they
    /// never count against the failure strategy.
    pub async fn process(&self, url: &str) -> ScrapeResult<()> {
        let body = self.fetcher.fetch(url).await?;

        if let Some(cache) = &self.cache {
            let packed = cache::compress(body.as_bytes())?;
            cache.write(url, &packed).await?;
            return Ok(());
        }

        if let Some(extractor) = &self.extractor {
            match extractor.parse(url, &body) {
                Ok(record) => {
                    if let Some(sink) = &self.sink {
                        sink.lock().write(&record)?;
                    }
                }
                Err(e) => {
                    tracing::warn!(url, error = %e, "extractor failed; record dropped");
                }
            }
        }
        Ok(())
    }

    pub(crate) fn close_sink(&self) -> ScrapeResult<()> {
        if let Some(sink) = &self.sink {
            sink.lock().close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FailureStrategy;
    use crate::rate_limiter::MemoryStorage;
    use std::path::PathBuf;
    use std::time::Duration;

    fn fetcher_for(host: &str) -> Fetcher {
        let config = ScrapeConfig {
            host: host.to_string(),
            qps: 10.0,
            burst: 100.0,
            max_concurrency: 10,
            strategy: FailureStrategy::NeverStop,
            filters: Vec::new(),
            user_agent: "test-agent".to_string(),
            timeout: Duration::from_secs(15),
            verify_tls: true,
            progress: false,
            catalog_path: PathBuf::from("."),
            redis_url: None,
            min_idle_ms: 60_000,
        };
        let limiter = Arc::new(Limiter::new(10.0, 100.0, Arc::new(MemoryStorage::new())));
        Fetcher::new(&config, limiter).unwrap()
    }

    #[test]
    fn path_only_urls_gain_the_host() {
        let fetcher = fetcher_for("example.com");
        assert_eq!(
            fetcher.absolutize("/blog/a"),
            "https://example.com/blog/a"
        );
    }

    #[test]
    fn absolute_urls_pass_through() {
        let fetcher = fetcher_for("example.com");
        assert_eq!(
            fetcher.absolutize("http://other.com/x"),
            "http://other.com/x"
        );
        assert_eq!(
            fetcher.absolutize("https://example.com/y"),
            "https://example.com/y"
        );
    }
}
