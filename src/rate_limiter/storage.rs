//! Bucket storage backends for the token-bucket limiter.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Instant;

/// Storage abstraction over per-key bucket state.
///
/// Implementations serialize concurrent `consume` calls for the same key;
/// buckets for distinct keys are fully independent. A shared backend (one
/// whose state lives outside the process) plugs in behind the same method.
pub trait BucketStorage: Send + Sync {
    /// Apply continuous refill for `key`, then consume `tokens` if the
    /// bucket holds at least that many. Returns whether consumption
    /// happened. Must not block beyond its internal per-key lock.
    fn consume(&self, key: &str, tokens: f64, rate: f64, capacity: f64) -> bool;
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// In-process bucket storage. Buckets start full, so a fresh key can burst
/// up to `capacity` immediately.
#[derive(Default)]
pub struct MemoryStorage {
    buckets: DashMap<String, Mutex<Bucket>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BucketStorage for MemoryStorage {
    fn consume(&self, key: &str, tokens: f64, rate: f64, capacity: f64) -> bool {
        let entry = self.buckets.entry(key.to_string()).or_insert_with(|| {
            Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            })
        });

        let mut bucket = entry.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * rate).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= tokens {
            bucket.tokens -= tokens;
            true
        } else {
            false
        }
    }
}
