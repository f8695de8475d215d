//! File sink: CSV for mapping records, JSON lines for everything else.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use serde_json::Value;

use super::{Record, Sink};
use crate::error::{ScrapeError, ScrapeResult};

// The first record decides the file's format; the two cannot mix.
enum Mode {
    Csv {
        writer: csv::Writer<File>,
        headers: Vec<String>,
    },
    Lines(File),
}

/// Sink writing one file per run, opened lazily on the first record
pub struct FileSink {
    path: PathBuf,
    mode: Option<Mode>,
}

impl FileSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: None,
        }
    }

    fn create_file(&self) -> ScrapeResult<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(File::create(&self.path)?)
    }

    fn write_row(&mut self, map: &serde_json::Map<String, Value>) -> ScrapeResult<()> {
        if self.mode.is_none() {
            let mut writer = csv::Writer::from_writer(self.create_file()?);
            let headers: Vec<String> = map.keys().cloned().collect();
            writer
                .write_record(&headers)
                .map_err(|e| ScrapeError::Sink(e.to_string()))?;
            self.mode = Some(Mode::Csv { writer, headers });
        }
        match self.mode.as_mut() {
            Some(Mode::Csv { writer, headers }) => {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h).map(cell_value).unwrap_or_default())
                    .collect();
                writer
                    .write_record(&row)
                    .map_err(|e| ScrapeError::Sink(e.to_string()))?;
                writer
                    .flush()
                    .map_err(|e| ScrapeError::Sink(e.to_string()))?;
                Ok(())
            }
            _ => Err(ScrapeError::InvalidSinkState),
        }
    }

    fn write_line(&mut self, value: &Value) -> ScrapeResult<()> {
        if self.mode.is_none() {
            self.mode = Some(Mode::Lines(self.create_file()?));
        }
        match self.mode.as_mut() {
            Some(Mode::Lines(file)) => {
                let line =
                    serde_json::to_string(value).map_err(|e| ScrapeError::Sink(e.to_string()))?;
                writeln!(file, "{line}")?;
                file.flush()?;
                Ok(())
            }
            _ => Err(ScrapeError::InvalidSinkState),
        }
    }
}

impl Sink for FileSink {
    fn write(&mut self, record: &Record) -> ScrapeResult<()> {
        match record {
            Value::Object(map) => self.write_row(map),
            Value::Array(items) if items.first().is_some_and(Value::is_object) => {
                for item in items {
                    match item {
                        Value::Object(map) => self.write_row(map)?,
                        other => {
                            return Err(ScrapeError::Sink(format!(
                                "expected mapping in record list, got {other}"
                            )))
                        }
                    }
                }
                Ok(())
            }
            other => self.write_line(other),
        }
    }

    fn close(&mut self) -> ScrapeResult<()> {
        match self.mode.take() {
            Some(Mode::Csv { mut writer, .. }) => writer
                .flush()
                .map_err(|e| ScrapeError::Sink(e.to_string())),
            Some(Mode::Lines(mut file)) => Ok(file.flush()?),
            None => Ok(()),
        }
    }
}

fn cell_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
