//! Short-TTL key/value cache for serialized score lists.

use dashmap::DashMap;
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::adapters::Sport;
use crate::TARGET_DB;

/// Builds the cache key for a sport/mode score list.
pub fn scores_key(sport: Sport, mode: &str) -> String {
    format!("scores:sport:{}:{}", sport.as_str(), mode)
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-process TTL cache. Each write replaces the whole entry atomically;
/// reads never return expired values. Expired entries linger until read or
/// swept by maintenance.
pub struct Cache {
    entries: DashMap<String, CacheEntry>,
}

impl Cache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Atomic set-with-expiry.
    pub fn set_ex(&self, key: &str, value: String, ttl: Duration) {
        debug!(target: TARGET_DB, "Cache set {} (ttl {:?})", key, ttl);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Remaining TTL for an unexpired key.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.get(key).and_then(|entry| {
            entry
                .expires_at
                .checked_duration_since(Instant::now())
        })
    }

    /// Sweeps expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn key_shape() {
        assert_eq!(scores_key(Sport::Nba, "featured"), "scores:sport:NBA:featured");
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = Cache::new();
        cache.set_ex("k", "v".to_string(), Duration::from_secs(300));
        assert_eq!(cache.get("k").as_deref(), Some("v"));
        assert!(cache.ttl("k").unwrap() <= Duration::from_secs(300));
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache = Cache::new();
        cache.set_ex("k", "v".to_string(), Duration::from_millis(20));
        sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test]
    async fn overwrite_replaces_value_and_ttl() {
        let cache = Cache::new();
        cache.set_ex("k", "old".to_string(), Duration::from_millis(10));
        cache.set_ex("k", "new".to_string(), Duration::from_secs(60));
        sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn purge_sweeps_only_expired() {
        let cache = Cache::new();
        cache.set_ex("stale", "x".to_string(), Duration::from_millis(10));
        cache.set_ex("fresh", "y".to_string(), Duration::from_secs(60));
        sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
