//! Per-host request spacing.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

use crate::TARGET_WEB_REQUEST;

/// Enforces a minimum interval between requests to any single host.
///
/// One instance is shared by every adapter in the process. Callers for the
/// same host are serialized: the host slot's lock is held across the sleep,
/// so two concurrent callers cannot both pass before the interval elapses.
/// Different hosts proceed independently.
pub struct RateLimiter {
    min_interval: Duration,
    hosts: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            hosts: DashMap::new(),
        }
    }

    /// Waits until at least `min_interval` has passed since the last granted
    /// request to `host`, then records the new grant before returning.
    /// Never fails; worst case it delays.
    pub async fn wait_if_needed(&self, host: &str) {
        let slot = self
            .hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut last_request = slot.lock().await;
        if let Some(previous) = *last_request {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(target: TARGET_WEB_REQUEST, "Rate limiting {}: waiting {:?}", host, wait);
                sleep(wait).await;
            }
        }
        *last_request = Some(Instant::now());
    }

    /// Clears all host state. Test and administrative use only.
    pub fn reset(&self) {
        self.hosts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consecutive_calls_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let start = Instant::now();
        limiter.wait_if_needed("host.example").await;
        limiter.wait_if_needed("host.example").await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn different_hosts_do_not_block_each_other() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        limiter.wait_if_needed("a.example").await;
        let start = Instant::now();
        limiter.wait_if_needed("b.example").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn concurrent_same_host_calls_serialize() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(40)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.wait_if_needed("host.example").await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Three grants require two full intervals between them.
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn reset_clears_state() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        limiter.wait_if_needed("host.example").await;
        limiter.reset();
        let start = Instant::now();
        limiter.wait_if_needed("host.example").await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
