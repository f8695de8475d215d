//! Host-scoped, rate-limited scraping engine.
//!
//! URLs for one target host live in a persistent ordered catalog and are
//! fetched through a token-bucket-governed, bounded-concurrency pipeline.
//! Progress persists as a resumable cursor, and a Redis-stream fabric with
//! consumer-group semantics lets several workers share one host's load.

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod extract;
pub mod rate_limiter;
pub mod sink;
pub mod stream;

pub use cache::{DiskCache, RedisCache, ResponseCache};
pub use catalog::UrlCatalog;
pub use config::{FailureStrategy, ScrapeConfig, ScraperBuilder};
pub use engine::Scraper;
pub use error::{ScrapeError, ScrapeResult};
pub use extract::Extractor;
pub use rate_limiter::{BucketStorage, Limiter, MemoryStorage};
pub use sink::{ConsoleSink, FileSink, Record, Sink};
pub use stream::{StreamConsumer, StreamDispatcher};
