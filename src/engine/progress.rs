//! Progress bar for interactive runs.

use indicatif::{ProgressBar, ProgressStyle};

/// Thin wrapper so call sites don't branch on whether progress is enabled
pub struct ScrapeProgress {
    bar: Option<ProgressBar>,
}

impl ScrapeProgress {
    #[must_use]
    pub fn new(enabled: bool, total: u64, initial: u64, host: &str) -> Self {
        if !enabled {
            return Self { bar: None };
        }
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
        bar.set_style(style);
        bar.set_message(format!("scraping {host}"));
        bar.set_position(initial);
        Self { bar: Some(bar) }
    }

    pub fn tick(&self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
