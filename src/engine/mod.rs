//! Fetch engine: shared HTTP primitive, local catalog-driven scraping, and
//! the supporting pieces (browser headers, watermark cursor, progress bar).

pub mod fetch;
pub mod headers;
pub mod local;
pub mod progress;
pub mod watermark;

pub use fetch::{Fetcher, ScrapePipeline};
pub use headers::{browser_headers, default_user_agent};
pub use local::Scraper;
pub use watermark::Watermark;
