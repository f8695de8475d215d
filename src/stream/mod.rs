//! Durable stream fabric for distributed scraping.
//!
//! URLs are produced onto one Redis stream per host and divided among
//! workers through a consumer group with at-least-once delivery: every
//! entry stays pending until its consumer acks it, and entries idle past a
//! threshold are reclaimed by whichever worker recovers first.

mod consumer;
mod dispatcher;

pub use consumer::StreamConsumer;
pub use dispatcher::StreamDispatcher;

/// Consumer group every worker joins
pub const CONSUMER_GROUP: &str = "scrapers";

/// Stream key for a host
#[must_use]
pub fn stream_key(host: &str) -> String {
    format!("stream-scraper:scrape:{host}")
}
