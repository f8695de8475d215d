//! Error types for scraping operations.
//!
//! One enum covers the whole pipeline: configuration problems surface at
//! build time, per-URL fetch problems are handled by the engine's failure
//! strategy, and storage-backend problems are always fatal.

use thiserror::Error;

/// Result type alias for scraping operations
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Error type shared by the catalog, engine, stream fabric, and sinks
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Builder validation failed
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection, DNS, TLS, or timeout failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-2xx status
    #[error("unexpected status {status} for {url}")]
    Http {
        status: reqwest::StatusCode,
        url: String,
    },

    /// User extractor failed for one URL
    #[error("extractor failed for {url}: {message}")]
    Extract { url: String, message: String },

    /// Sink rejected a record
    #[error("sink rejected record: {0}")]
    Sink(String),

    /// CSV mapping records and JSON-line records cannot share one file
    #[error("cannot mix CSV and JSON-line records in one sink file")]
    InvalidSinkState,

    /// Catalog store failure
    #[error("catalog storage error: {0}")]
    Catalog(#[from] rocksdb::Error),

    /// Stream broker or remote cache failure
    #[error("stream backend error: {0}")]
    Stream(#[from] redis::RedisError),

    /// Sitemap could not be fetched or parsed
    #[error("sitemap unavailable for {0}")]
    SitemapUnavailable(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    /// Per-URL failures that `StopOnFail` elevates into a cooperative engine
    /// stop. Extractor failures are excluded: they are logged and never stop
    /// a run.
    #[must_use]
    pub fn stops_engine(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Http { .. } | Self::Sink(_) | Self::InvalidSinkState
        )
    }

    /// Storage failures are fatal regardless of the failure strategy.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Catalog(_) | Self::Stream(_))
    }
}
