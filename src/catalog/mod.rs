//! Host-partitioned persistent URL catalog with resumable cursor.
//!
//! Every URL for a host keys as `host 0x00 path[?query]`, so one ordered
//! store can hold many hosts without interleaving. Two sentinel entries
//! frame the host's range: `host 0x00` below every real key and `host 0x01`
//! above them. The cursor entry lives under `host:cursor`, which sorts past
//! the upper sentinel and therefore never shows up in range iteration.
//!
//! The cursor stores the key of the last URL that reached a terminal state;
//! resuming iterates from that key and skips the entry equal to it.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{DBIterator, Direction, IteratorMode, Options, DB};
use url::Url;

use crate::error::ScrapeResult;

/// Default on-disk location for the catalog store
pub const DEFAULT_CATALOG_PATH: &str = "./.rocksdb";

/// Host-scoped view over the shared ordered store
pub struct UrlCatalog {
    db: Arc<DB>,
    host: String,
    lower: Vec<u8>,
    upper: Vec<u8>,
    cursor_key: Vec<u8>,
}

impl UrlCatalog {
    /// Open (or create) the store at `path` and scope it to `host`.
    pub fn open(host: &str, path: impl AsRef<Path>) -> ScrapeResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Self::with_db(Arc::new(db), host)
    }

    /// Scope an already-open store to `host`. Several hosts can share one
    /// store handle; their sentinel ranges keep the keys disjoint.
    pub fn with_db(db: Arc<DB>, host: &str) -> ScrapeResult<Self> {
        let lower = [host.as_bytes(), &[0x00]].concat();
        let upper = [host.as_bytes(), &[0x01]].concat();
        let cursor_key = format!("{host}:cursor").into_bytes();
        db.put(&lower, b"")?;
        db.put(&upper, b"")?;
        Ok(Self {
            db,
            host: host.to_string(),
            lower,
            upper,
            cursor_key,
        })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Lower sentinel key, below every real key for this host
    #[must_use]
    pub fn lower(&self) -> &[u8] {
        &self.lower
    }

    /// Upper sentinel key, above every real key for this host
    #[must_use]
    pub fn upper(&self) -> &[u8] {
        &self.upper
    }

    /// Catalog key for a path + query pair
    #[must_use]
    pub fn key_for(&self, path: &str, query: &str) -> Vec<u8> {
        let mut key = self.lower.clone();
        key.extend_from_slice(path.as_bytes());
        if !query.is_empty() {
            key.push(b'?');
            key.extend_from_slice(query.as_bytes());
        }
        key
    }

    /// Catalog key a URL would be stored under
    #[must_use]
    pub fn key_of(&self, url: &str) -> Vec<u8> {
        let (path, query) = split_path_query(url);
        self.key_for(&path, &query)
    }

    /// Insert a URL. Re-adding the same path + query overwrites in place,
    /// so the catalog holds one entry per normalized key.
    pub fn add(&self, url: &str) -> ScrapeResult<()> {
        let url = url.trim();
        self.db.put(self.key_of(url), url.as_bytes())?;
        Ok(())
    }

    /// Remove a URL's entry.
    pub fn delete(&self, url: &str) -> ScrapeResult<()> {
        self.db.delete(self.key_of(url.trim()))?;
        Ok(())
    }

    /// Iterate `(key, url)` pairs in ascending key order starting at `from`
    /// (inclusive; defaults to the lower sentinel). Sentinels are never
    /// yielded and iteration stops at the first key outside this host's
    /// range.
    pub fn iterate(&self, from: Option<&[u8]>) -> CatalogIter<'_> {
        self.iter_inner(from, None)
    }

    /// Like [`iterate`](Self::iterate), but also skips the entry whose key
    /// equals `after` — the resume shape for a cursor that stores the last
    /// completed key.
    pub fn iterate_after(&self, after: &[u8]) -> CatalogIter<'_> {
        self.iter_inner(Some(after), Some(after.to_vec()))
    }

    fn iter_inner(&self, from: Option<&[u8]>, skip: Option<Vec<u8>>) -> CatalogIter<'_> {
        let start = from.unwrap_or(&self.lower);
        let inner = self
            .db
            .iterator(IteratorMode::From(start, Direction::Forward));
        CatalogIter {
            inner,
            lower: &self.lower,
            skip,
            done: false,
        }
    }

    /// Persist the resume marker; `None` resets it to the lower sentinel.
    pub fn set_cursor(&self, key: Option<&[u8]>) -> ScrapeResult<()> {
        self.db
            .put(&self.cursor_key, key.unwrap_or(&self.lower))?;
        Ok(())
    }

    /// Read the resume marker; unset defaults to the lower sentinel.
    pub fn get_cursor(&self) -> ScrapeResult<Vec<u8>> {
        Ok(self
            .db
            .get(&self.cursor_key)?
            .unwrap_or_else(|| self.lower.clone()))
    }

    /// Number of URLs stored for this host. O(N); advisory, for progress UI.
    pub fn total(&self) -> ScrapeResult<usize> {
        let mut n = 0;
        for entry in self.iterate(None) {
            entry?;
            n += 1;
        }
        Ok(n)
    }

    /// Ordinal of the cursor within iteration order. O(N); advisory.
    pub fn current_index(&self) -> ScrapeResult<usize> {
        let cursor = self.get_cursor()?;
        if cursor == self.lower {
            return Ok(0);
        }
        let mut n = 0;
        for entry in self.iterate(None) {
            let (key, _) = entry?;
            if key > cursor {
                break;
            }
            n += 1;
        }
        Ok(n)
    }
}

/// Lazy range iterator over one host's catalog entries
pub struct CatalogIter<'a> {
    inner: DBIterator<'a>,
    lower: &'a [u8],
    skip: Option<Vec<u8>>,
    done: bool,
}

impl Iterator for CatalogIter<'_> {
    type Item = ScrapeResult<(Vec<u8>, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.inner.next() {
                None => {
                    self.done = true;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                Some(Ok((key, value))) => {
                    if key.as_ref() == self.lower {
                        continue;
                    }
                    // The upper sentinel (`host 0x01`) fails the prefix test
                    // along with every other host's key.
                    if !key.starts_with(self.lower) {
                        self.done = true;
                        return None;
                    }
                    if self.skip.as_deref() == Some(key.as_ref()) {
                        continue;
                    }
                    let url = String::from_utf8_lossy(&value).into_owned();
                    return Some(Ok((key.into_vec(), url)));
                }
            }
        }
        None
    }
}

/// Split a URL into the `(path, query)` pair used for keying and for path
/// filters. The host never comes from the URL — catalogs are scoped to a
/// configured host — so an unparsable or relative input keys as a bare
/// path. Path defaults to `/`; an empty query stays empty.
#[must_use]
pub fn split_path_query(url: &str) -> (String, String) {
    let url = url.trim();
    if let Ok(parsed) = Url::parse(url) {
        if parsed.has_host() {
            let path = parsed.path();
            let path = if path.is_empty() { "/" } else { path };
            let query = parsed.query().unwrap_or("");
            return (path.to_string(), query.to_string());
        }
    }
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let path = if path.is_empty() { "/" } else { path };
    (path.to_string(), query.to_string())
}
