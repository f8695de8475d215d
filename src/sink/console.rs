//! Console sink for interactive inspection.

use super::{Record, Sink};
use crate::error::{ScrapeError, ScrapeResult};

/// Sink printing every record to stdout
pub struct ConsoleSink {
    pretty: bool,
}

impl ConsoleSink {
    #[must_use]
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Sink for ConsoleSink {
    fn write(&mut self, record: &Record) -> ScrapeResult<()> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(record)
        } else {
            serde_json::to_string(record)
        }
        .map_err(|e| ScrapeError::Sink(e.to_string()))?;
        println!("{rendered}");
        Ok(())
    }

    fn close(&mut self) -> ScrapeResult<()> {
        Ok(())
    }
}
