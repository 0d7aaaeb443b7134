// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache for per-receiver handshake listings.
//!
//! Receivers poll their inbox far more often than new handshakes arrive,
//! so the full listing is cached per receiver and dropped on every write
//! touching that receiver.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use super::HandshakeSummary;

/// Cached entry: listing + insertion timestamp.
struct CacheEntry {
    summaries: Vec<HandshakeSummary>,
    inserted_at: Instant,
}

struct Inner {
    entries: LruCache<String, CacheEntry>,
    /// Bumped on every invalidation. A listing read under an older
    /// generation is never cached.
    generations: HashMap<String, u64>,
}

/// In-process LRU cache for hot receiver listings.
///
/// Readers take [`generation`](Self::generation) before reading the
/// database and hand it back to [`put`](Self::put), so a listing that raced
/// with a write is dropped instead of cached.
pub struct ReceiverListCache {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl ReceiverListCache {
    /// Create a new cache with the given capacity and TTL.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
                generations: HashMap::new(),
            }),
            ttl,
        }
    }

    /// Cached listing for a receiver; `None` if absent or expired.
    pub fn get(&self, receiver_id: &str) -> Option<Vec<HandshakeSummary>> {
        let mut inner = self.inner.lock().ok()?;
        if let Some(entry) = inner.entries.get(receiver_id) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.summaries.clone());
            }
            inner.entries.pop(receiver_id);
        }
        None
    }

    /// Current write generation for a receiver.
    pub fn generation(&self, receiver_id: &str) -> u64 {
        self.inner
            .lock()
            .map(|inner| inner.generations.get(receiver_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Cache a listing read under `generation`. Returns `false` (and caches
    /// nothing) if the receiver was invalidated since.
    pub fn put(
        &self,
        receiver_id: &str,
        generation: u64,
        summaries: Vec<HandshakeSummary>,
    ) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        if inner.generations.get(receiver_id).copied().unwrap_or(0) != generation {
            return false;
        }
        inner.entries.put(
            receiver_id.to_string(),
            CacheEntry {
                summaries,
                inserted_at: Instant::now(),
            },
        );
        true
    }

    pub fn invalidate(&self, receiver_id: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.pop(receiver_id);
            *inner.generations.entry(receiver_id.to_string()).or_insert(0) += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::BackendKind;
    use crate::ledger::HandshakeStatus;
    use chrono::Utc;

    fn summary(id: &str) -> HandshakeSummary {
        HandshakeSummary {
            id: id.to_string(),
            sender_id: "s".to_string(),
            receiver_id: "r".to_string(),
            blob_locator: "loc".to_string(),
            blob_backend: BackendKind::Remote,
            file_name: "f".to_string(),
            created_at: Utc::now(),
            status: HandshakeStatus::Uploaded,
            downloaded_at: None,
            ledger_mirror: None,
        }
    }

    #[test]
    fn put_get_invalidate() {
        let cache = ReceiverListCache::new(4, Duration::from_secs(60));
        assert!(cache.get("r").is_none());

        assert!(cache.put("r", cache.generation("r"), vec![summary("a")]));
        assert_eq!(cache.get("r").unwrap()[0].id, "a");

        cache.invalidate("r");
        assert!(cache.get("r").is_none());
    }

    #[test]
    fn entries_expire() {
        let cache = ReceiverListCache::new(4, Duration::from_millis(1));
        cache.put("r", 0, vec![summary("a")]);

        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("r").is_none());
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let cache = ReceiverListCache::new(1, Duration::from_secs(60));
        cache.put("r1", 0, vec![summary("a")]);
        cache.put("r2", 0, vec![summary("b")]);

        assert!(cache.get("r1").is_none());
        assert!(cache.get("r2").is_some());
    }

    #[test]
    fn listing_read_before_a_write_is_not_cached() {
        let cache = ReceiverListCache::new(4, Duration::from_secs(60));

        // Reader snapshots the generation, then a writer commits and
        // invalidates before the reader gets to cache its listing.
        let seen = cache.generation("r");
        cache.invalidate("r");

        assert!(!cache.put("r", seen, vec![summary("stale")]));
        assert!(cache.get("r").is_none());

        // Other receivers are unaffected.
        assert!(cache.put("other", cache.generation("other"), vec![summary("b")]));
        assert!(cache.get("other").is_some());
    }
}
