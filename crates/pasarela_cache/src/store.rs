use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::entry::StoredResponse;

struct CacheSlot {
    response: Arc<StoredResponse>,
    inserted_at: Instant,
}

/// Shared response cache: bounded entry count, TTL expiry on lookup,
/// deterministic FIFO eviction on insertion into a full cache.
///
/// Reads go straight to the concurrent map and never touch the insertion
/// order queue. The capacity check in `put` is not atomic with the insert;
/// racing writers may overshoot by an entry, which later `put`s settle back.
pub struct ResponseCache {
    entries: DashMap<String, CacheSlot>,
    order: Mutex<VecDeque<String>>,
    max_entries: usize,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            max_entries,
            ttl,
        }
    }

    /// Returns the stored response iff present and not past the TTL.
    /// Expired entries are removed as a side effect of the lookup.
    pub fn get(&self, key: &str) -> Option<Arc<StoredResponse>> {
        {
            let slot = self.entries.get(key)?;
            if slot.inserted_at.elapsed() <= self.ttl {
                return Some(slot.response.clone());
            }
        }
        self.entries.remove(key);
        None
    }

    /// Inserts or replaces. A new key entering a full cache evicts the
    /// oldest-inserted surviving entry first.
    pub fn put(&self, key: String, response: StoredResponse) {
        let slot = CacheSlot {
            response: Arc::new(response),
            inserted_at: Instant::now(),
        };

        if self.entries.contains_key(&key) {
            self.entries.insert(key, slot);
            return;
        }

        // Usually evicts exactly one entry; the loop also drains any
        // transient overshoot left behind by racing writers.
        while self.entries.len() >= self.max_entries {
            if !self.evict_one() {
                break;
            }
        }

        if let Ok(mut order) = self.order.lock() {
            order.push_back(key.clone());
        }
        self.entries.insert(key, slot);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pops queued keys until one still maps to a live entry. Keys whose
    /// entries already expired away are skipped and dropped from the queue.
    /// Returns false when nothing was left to evict.
    fn evict_one(&self) -> bool {
        let Ok(mut order) = self.order.lock() else {
            return false;
        };
        while let Some(victim) = order.pop_front() {
            if self.entries.remove(&victim).is_some() {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ResponseCache;
    use crate::entry::StoredResponse;

    fn response(body: &str) -> StoredResponse {
        let raw = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}", body.len());
        StoredResponse::from_bytes(raw.into_bytes())
    }

    #[test]
    fn get_returns_what_put_stored() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.put("http://origin/x".into(), response("HELLO"));

        let hit = cache.get("http://origin/x").expect("expected hit");
        assert_eq!(hit.status(), 200);
        assert!(hit.as_bytes().ends_with(b"HELLO"));
        assert!(cache.get("http://origin/y").is_none());
    }

    #[test]
    fn capacity_never_exceeded_after_sequential_puts() {
        let cache = ResponseCache::new(3, Duration::from_secs(60));
        for i in 0..20 {
            cache.put(format!("http://origin/{i}"), response("x"));
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn eviction_is_fifo_by_insertion() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.put("http://origin/a".into(), response("a"));
        cache.put("http://origin/b".into(), response("b"));
        cache.put("http://origin/c".into(), response("c"));

        assert!(cache.get("http://origin/a").is_none());
        assert!(cache.get("http://origin/b").is_some());
        assert!(cache.get("http://origin/c").is_some());
    }

    #[test]
    fn replacing_an_existing_key_does_not_evict() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.put("http://origin/a".into(), response("a1"));
        cache.put("http://origin/b".into(), response("b"));
        cache.put("http://origin/a".into(), response("a2"));

        assert_eq!(cache.len(), 2);
        let hit = cache.get("http://origin/a").expect("expected hit");
        assert!(hit.as_bytes().ends_with(b"a2"));
        assert!(cache.get("http://origin/b").is_some());
    }

    #[test]
    fn expired_entries_miss_and_are_removed() {
        let cache = ResponseCache::new(10, Duration::from_millis(0));
        cache.put("http://origin/x".into(), response("x"));
        std::thread::sleep(Duration::from_millis(10));

        assert!(cache.get("http://origin/x").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn eviction_skips_keys_already_expired_away() {
        let cache = ResponseCache::new(2, Duration::from_millis(0));
        cache.put("http://origin/a".into(), response("a"));
        cache.put("http://origin/b".into(), response("b"));
        std::thread::sleep(Duration::from_millis(10));

        // Both entries expire out through lookups; their queued keys are
        // stale and must not satisfy a later eviction.
        assert!(cache.get("http://origin/a").is_none());
        assert!(cache.get("http://origin/b").is_none());

        cache.put("http://origin/c".into(), response("c"));
        cache.put("http://origin/d".into(), response("d"));
        cache.put("http://origin/e".into(), response("e"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_puts_settle_at_capacity() {
        use std::sync::Arc;

        let cache = Arc::new(ResponseCache::new(8, Duration::from_secs(60)));
        let mut handles = Vec::new();
        for t in 0..4 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    cache.put(format!("http://origin/{t}/{i}"), response("x"));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker panicked");
        }

        // A subsequent put drains any transient overshoot left by the race.
        cache.put("http://origin/final".into(), response("x"));
        assert!(cache.len() <= 8);
    }
}
