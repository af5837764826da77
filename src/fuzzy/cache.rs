//! Fuzzification Cache
//!
//! One LRU structure with a time-to-live: entries are ordered by recency and
//! expired entries are dropped when a lookup finds them.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::engine::FuzzificationResult;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(size) => size,
    None => panic!("constant is non-zero"),
};

/// Cache key: sensor type plus the exact bit pattern of the value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    sensor_type: String,
    value_bits: u64,
}

impl CacheKey {
    pub fn new(sensor_type: &str, value: f64) -> Self {
        // -0.0 and 0.0 compare equal, so they share a slot
        let value = if value == 0.0 { 0.0 } else { value };
        Self {
            sensor_type: sensor_type.to_string(),
            value_bits: value.to_bits(),
        }
    }

    pub fn sensor_type(&self) -> &str {
        &self.sensor_type
    }
}

struct CacheEntry {
    result: Arc<FuzzificationResult>,
    inserted_at: Instant,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub entries: usize,
    pub capacity: usize,
}

pub struct FuzzyCache {
    entries: LruCache<CacheKey, CacheEntry>,
    ttl: Duration,
    hits: u64,
    misses: u64,
    expired: u64,
}

impl FuzzyCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            entries: LruCache::new(capacity),
            ttl,
            hits: 0,
            misses: 0,
            expired: 0,
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<FuzzificationResult>> {
        self.get_at(key, Instant::now())
    }

    /// Lookup relative to `now`; an expired entry is removed and counts as a miss
    pub fn get_at(&mut self, key: &CacheKey, now: Instant) -> Option<Arc<FuzzificationResult>> {
        let is_expired = match self.entries.peek(key) {
            Some(entry) => now.saturating_duration_since(entry.inserted_at) >= self.ttl,
            None => {
                self.misses += 1;
                return None;
            }
        };

        if is_expired {
            self.entries.pop(key);
            self.expired += 1;
            self.misses += 1;
            return None;
        }

        self.hits += 1;
        self.entries.get(key).map(|entry| entry.result.clone())
    }

    pub fn insert(&mut self, key: CacheKey, result: Arc<FuzzificationResult>) {
        self.insert_at(key, result, Instant::now());
    }

    pub fn insert_at(&mut self, key: CacheKey, result: Arc<FuzzificationResult>, now: Instant) {
        self.entries.put(
            key,
            CacheEntry {
                result,
                inserted_at: now,
            },
        );
    }

    /// Drop every entry belonging to `sensor_type`, returning how many were removed
    pub fn invalidate_type(&mut self, sensor_type: &str) -> usize {
        let stale: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(key, _)| key.sensor_type() == sensor_type)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            self.entries.pop(key);
        }
        stale.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            expired: self.expired,
            entries: self.entries.len(),
            capacity: self.entries.cap().get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(sensor_type: &str, value: f64) -> Arc<FuzzificationResult> {
        Arc::new(FuzzificationResult {
            sensor_type: sensor_type.to_string(),
            value,
            memberships: Vec::new(),
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn test_hit_returns_same_result() {
        let mut cache = FuzzyCache::new(4, Duration::from_secs(60));
        let key = CacheKey::new("temperature", 21.5);
        let stored = result("temperature", 21.5);
        cache.insert(key.clone(), stored.clone());

        let hit = cache.get(&key).unwrap();
        assert!(Arc::ptr_eq(&hit, &stored));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let mut cache = FuzzyCache::new(4, Duration::from_secs(10));
        let key = CacheKey::new("temperature", 30.0);
        let start = Instant::now();
        cache.insert_at(key.clone(), result("temperature", 30.0), start);

        assert!(cache.get_at(&key, start + Duration::from_secs(5)).is_some());
        assert!(cache.get_at(&key, start + Duration::from_secs(11)).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = FuzzyCache::new(2, Duration::from_secs(60));
        let a = CacheKey::new("t", 1.0);
        let b = CacheKey::new("t", 2.0);
        let c = CacheKey::new("t", 3.0);
        cache.insert(a.clone(), result("t", 1.0));
        cache.insert(b.clone(), result("t", 2.0));
        // touch a so b becomes least recently used
        assert!(cache.get(&a).is_some());
        cache.insert(c.clone(), result("t", 3.0));

        assert!(cache.get(&a).is_some());
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&c).is_some());
    }

    #[test]
    fn test_invalidate_only_one_type() {
        let mut cache = FuzzyCache::new(8, Duration::from_secs(60));
        cache.insert(CacheKey::new("temperature", 1.0), result("temperature", 1.0));
        cache.insert(CacheKey::new("temperature", 2.0), result("temperature", 2.0));
        cache.insert(CacheKey::new("humidity", 1.0), result("humidity", 1.0));

        assert_eq!(cache.invalidate_type("temperature"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&CacheKey::new("humidity", 1.0)).is_some());
    }

    #[test]
    fn test_negative_zero_shares_key() {
        assert_eq!(CacheKey::new("t", -0.0), CacheKey::new("t", 0.0));
    }
}
