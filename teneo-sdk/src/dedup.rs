//! [`DedupCache`]: a bounded, time-limited set of recently observed message ids.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks message ids seen within the last `ttl`, up to `max_size` entries.
///
/// Eviction prefers entries past their TTL; if none are expired and the cache is full,
/// the single oldest insertion is evicted to make room (`spec.md` §3, §8).
pub struct DedupCache {
    ttl: Duration,
    max_size: usize,
    // insertion order preserved via a monotonically increasing sequence number so we
    // can find "oldest" in O(n) without pulling in an ordered-map dependency for what
    // is, at these sizes, a cold path.
    entries: HashMap<String, (Instant, u64)>,
    next_seq: u64,
}

impl DedupCache {
    /// Creates a cache with the given TTL and maximum entry count.
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        DedupCache {
            ttl,
            max_size,
            entries: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Checks whether `id` has been seen within the TTL window. Does not mutate the
    /// cache; callers should follow a `false` result with [`DedupCache::insert`].
    pub fn contains(&mut self, id: &str) -> bool {
        self.evict_expired();
        self.entries.contains_key(id)
    }

    /// Records `id` as seen now, evicting as needed to respect `max_size`.
    pub fn insert(&mut self, id: impl Into<String>) {
        self.evict_expired();
        let id = id.into();
        if self.entries.len() >= self.max_size && !self.entries.contains_key(&id) {
            self.evict_oldest();
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(id, (Instant::now(), seq));
    }

    /// Current number of tracked entries (including any not yet lazily evicted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache currently tracks no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (inserted, _)| inserted.elapsed() < ttl);
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest_key) = self
            .entries
            .iter()
            .min_by_key(|(_, (_, seq))| *seq)
            .map(|(k, _)| k.clone())
        {
            self.entries.remove(&oldest_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_delivery_within_ttl_is_a_hit() {
        let mut cache = DedupCache::new(Duration::from_secs(60), 10);
        assert!(!cache.contains("m-1"));
        cache.insert("m-1");
        assert!(cache.contains("m-1"));
    }

    #[test]
    fn evicts_oldest_entry_before_accepting_new_one_at_capacity() {
        let mut cache = DedupCache::new(Duration::from_secs(60), 2);
        cache.insert("a");
        cache.insert("b");
        cache.insert("c");
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn entries_past_ttl_are_not_hits() {
        let mut cache = DedupCache::new(Duration::from_millis(1), 10);
        cache.insert("m-1");
        std::thread::sleep(Duration::from_millis(5));
        assert!(!cache.contains("m-1"));
    }
}
