// Search/grant rate-limit cache: md5(key || value) keyed, rejects re-requests inside a
// configurable window. Grounded on the Go `checkAndSet` expiry-map pattern, backed by the
// teacher's `lru::LruCache` usage for bounded size.

use crate::error::{DfsError, DfsResult};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait SearchCache: Send + Sync {
    /// Returns Ok(()) and records the attempt if outside the rate window, otherwise
    /// `Err(DfsError::TooFrequent)`.
    fn check_and_set(&self, key: &str, value: &str, now: Instant) -> DfsResult<()>;
}

pub struct LruSearchCache {
    window: Duration,
    entries: Mutex<LruCache<String, Instant>>,
}

impl LruSearchCache {
    pub fn new(window: Duration, capacity: usize) -> Self {
        LruSearchCache {
            window,
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap()),
            )),
        }
    }

    fn cache_key(key: &str, value: &str) -> String {
        let digest = md5::compute(format!("{}{}", key, value));
        format!("{:x}", digest)
    }
}

impl SearchCache for LruSearchCache {
    fn check_and_set(&self, key: &str, value: &str, now: Instant) -> DfsResult<()> {
        let cache_key = Self::cache_key(key, value);
        let mut entries = self.entries.lock().unwrap();
        if let Some(last) = entries.get(&cache_key) {
            if now.duration_since(*last) < self.window {
                return Err(DfsError::TooFrequent);
            }
        }
        entries.put(cache_key, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_call_within_window_is_too_frequent_then_succeeds_after() {
        let cache = LruSearchCache::new(Duration::from_secs(60), 1024);
        let t0 = Instant::now();
        assert!(cache.check_and_set("name", "report", t0).is_ok());
        let t_plus_10 = t0 + Duration::from_secs(10);
        match cache.check_and_set("name", "report", t_plus_10) {
            Err(DfsError::TooFrequent) => {}
            other => panic!("expected TooFrequent, got {:?}", other),
        }
        let t_plus_65 = t0 + Duration::from_secs(65);
        assert!(cache.check_and_set("name", "report", t_plus_65).is_ok());
    }

    #[test]
    fn distinct_key_value_pairs_are_independent() {
        let cache = LruSearchCache::new(Duration::from_secs(60), 1024);
        let t0 = Instant::now();
        assert!(cache.check_and_set("name", "a", t0).is_ok());
        assert!(cache.check_and_set("name", "b", t0).is_ok());
    }
}
