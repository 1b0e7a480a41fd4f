//! Lossy, atomic, direct-mapped dedup cache, spec.md 4.B. One slot per
//! bucket; a collision silently evicts whatever was there. Safe to share
//! across worker threads without external locking: each slot is a single
//! `AtomicU64`, so a concurrent `test` never observes a torn value, only
//! possibly a stale or just-replaced one (the cache is lossy by design, so
//! that race is harmless — at worst it costs a duplicate expansion).
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

pub struct DedupCache {
    slots: Vec<AtomicU64>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl DedupCache {
    pub fn new(size: usize) -> DedupCache {
        assert!(size > 0, "dedup cache size must be non-zero");
        let mut slots = Vec::with_capacity(size);
        slots.resize_with(size, || AtomicU64::new(0));
        DedupCache {
            slots,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Returns `true` iff `value` was already the resident of its bucket;
    /// either way, `value` becomes the new resident.
    pub fn test(&self, value: u64) -> bool {
        let index = (value as usize) % self.slots.len();
        let previous = self.slots[index].swap(value, Ordering::Relaxed);
        let hit = previous == value;
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Zeroes every slot and resets the hit/miss counters, logging the
    /// counters beforehand (spec.md's Design Notes call this the natural
    /// point to observe cache effectiveness per stratum).
    pub fn clear(&self) {
        let hits = self.hits.swap(0, Ordering::Relaxed);
        let misses = self.misses.swap(0, Ordering::Relaxed);
        log::info!("dedup cache: {hits} hits, {misses} misses");
        for slot in &self.slots {
            slot.store(0, Ordering::Relaxed);
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_a_miss() {
        let cache = DedupCache::new(16);
        assert!(!cache.test(42));
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn repeat_in_same_bucket_is_a_hit() {
        let cache = DedupCache::new(16);
        assert!(!cache.test(42));
        assert!(cache.test(42));
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn collision_evicts_resident() {
        let cache = DedupCache::new(16);
        assert!(!cache.test(42));
        assert!(!cache.test(42 + 16)); // same bucket, different value: miss, evicts 42
        assert!(!cache.test(42)); // 42 no longer resident: miss again
    }

    #[test]
    fn clear_resets_counters_and_slots() {
        let cache = DedupCache::new(4);
        cache.test(1);
        cache.test(1);
        cache.clear();
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.misses(), 0);
        assert!(!cache.test(1));
    }
}
