//! Core configuration types for the fetch engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;

/// What a per-URL fetch failure does to the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureStrategy {
    /// Stop starting new work after the first failure; in-flight tasks drain
    StopOnFail,
    /// Log every failure and keep going
    #[default]
    NeverStop,
}

/// Validated engine configuration, produced by
/// [`ScraperBuilder`](crate::config::ScraperBuilder)
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub(crate) host: String,
    pub(crate) qps: f64,
    pub(crate) burst: f64,
    pub(crate) max_concurrency: usize,
    pub(crate) strategy: FailureStrategy,
    pub(crate) filters: Vec<Regex>,
    pub(crate) user_agent: String,
    pub(crate) timeout: Duration,
    pub(crate) verify_tls: bool,
    pub(crate) progress: bool,
    pub(crate) catalog_path: PathBuf,
    pub(crate) redis_url: Option<String>,
    pub(crate) min_idle_ms: u64,
}

impl ScrapeConfig {
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn qps(&self) -> f64 {
        self.qps
    }

    #[must_use]
    pub fn burst(&self) -> f64 {
        self.burst
    }

    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    #[must_use]
    pub fn strategy(&self) -> FailureStrategy {
        self.strategy
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    #[must_use]
    pub fn progress(&self) -> bool {
        self.progress
    }

    #[must_use]
    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    #[must_use]
    pub fn redis_url(&self) -> Option<&str> {
        self.redis_url.as_deref()
    }

    /// Idle threshold after which a pending stream entry becomes claimable
    #[must_use]
    pub fn min_idle_ms(&self) -> u64 {
        self.min_idle_ms
    }

    /// Whether `path` passes the configured filters. No filters means
    /// everything passes.
    #[must_use]
    pub fn path_allowed(&self, path: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|rx| rx.is_match(path))
    }
}
