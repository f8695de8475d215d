//! `sx` command-line entry point.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    stream_scraper::cli::run().await
}
