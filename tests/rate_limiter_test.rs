//! Admission-rate bounds for the token-bucket limiter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use stream_scraper::{Limiter, MemoryStorage};

fn limiter(rate: f64, capacity: f64) -> Limiter {
    Limiter::new(rate, capacity, Arc::new(MemoryStorage::new()))
}

#[test]
fn burst_admits_at_most_capacity_instantly() {
    let l = limiter(2.0, 2.0);
    let mut admitted = 0;
    for _ in 0..10 {
        if l.consume("h") {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 2);
}

#[tokio::test]
async fn steady_state_rate_is_bounded() {
    // 2 req/s with burst 2: six admissions need at least the burst plus
    // four refills, i.e. ~2 s of accrual.
    let l = limiter(2.0, 2.0);
    let start = Instant::now();
    for _ in 0..6 {
        l.acquire("h").await;
    }
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1900), "too fast: {elapsed:?}");
    assert!(elapsed <= Duration::from_secs(4), "too slow: {elapsed:?}");
}

#[tokio::test]
async fn concurrent_consumers_share_one_bucket() {
    let l = Arc::new(limiter(50.0, 5.0));
    let start = Instant::now();
    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..15 {
        let l = Arc::clone(&l);
        tasks.spawn(async move { l.acquire("h").await });
    }
    while tasks.join_next().await.is_some() {}
    // 15 admissions at 50/s with burst 5 need ~200 ms of refill.
    assert!(start.elapsed() >= Duration::from_millis(150));
}
