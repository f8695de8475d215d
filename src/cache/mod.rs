//! Pluggable compressed response cache.
//!
//! When the engine runs with a cache it stores the Brotli-compressed body
//! of every fetched page instead of invoking the extractor. The backend is
//! opaque behind [`ResponseCache`]; the codec helpers live here so another
//! codec can slot in behind the same `read`/`write` shape.

mod disk;
mod redis;

pub use disk::DiskCache;
pub use redis::RedisCache;

use std::io::{Read, Write};

use async_trait::async_trait;

use crate::error::ScrapeResult;

/// Brotli window size used for cached bodies
const BROTLI_LGWIN: u32 = 22;
/// Brotli quality; 5 keeps compression fast enough to run inline
const BROTLI_QUALITY: u32 = 5;
const BROTLI_BUF: usize = 4096;

/// Content-addressed blob store for fetched bodies
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Read the cached value for `key`. A miss is `Ok(None)`, never an error.
    async fn read(&self, key: &str) -> ScrapeResult<Option<Vec<u8>>>;

    /// Write (or overwrite) the cached value for `key`.
    async fn write(&self, key: &str, value: &[u8]) -> ScrapeResult<()>;
}

/// Brotli-compress a response body for caching.
pub fn compress(body: &[u8]) -> ScrapeResult<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut writer =
            brotli::CompressorWriter::new(&mut out, BROTLI_BUF, BROTLI_QUALITY, BROTLI_LGWIN);
        writer.write_all(body)?;
        writer.flush()?;
    }
    Ok(out)
}

/// Inverse of [`compress`].
pub fn decompress(data: &[u8]) -> ScrapeResult<Vec<u8>> {
    let mut out = Vec::new();
    brotli::Decompressor::new(data, BROTLI_BUF).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_round_trip() {
        let body = b"<html><body>hello</body></html>".repeat(64);
        let packed = compress(&body).unwrap();
        assert!(packed.len() < body.len());
        assert_eq!(decompress(&packed).unwrap(), body);
    }
}
