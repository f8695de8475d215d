//! One-file-per-URL disk cache.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use tempfile::NamedTempFile;

use super::ResponseCache;
use crate::error::ScrapeResult;

/// Default cache directory, next to the process working directory
pub const DEFAULT_CACHE_DIR: &str = "./.cache_html";

/// Disk-backed cache storing each value under `<dir>/<sha1(url)>.br`
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = Sha1::new();
        hasher.update(key.as_bytes());
        let digest = hex::encode(hasher.finalize());
        self.dir.join(format!("{digest}.br"))
    }
}

impl Default for DiskCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_DIR)
    }
}

#[async_trait]
impl ResponseCache for DiskCache {
    async fn read(&self, key: &str) -> ScrapeResult<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> ScrapeResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let target = self.path_for(key);
        write_atomic(&self.dir, &target, value)
    }
}

// Write through a temp file in the target directory so concurrent writers
// never expose a torn entry.
fn write_atomic(dir: &Path, target: &Path, value: &[u8]) -> ScrapeResult<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(value)?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
