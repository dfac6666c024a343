use std::num::NonZeroUsize;

use lru::LruCache;
use tokio::sync::Mutex;

use crate::platform::{CopyId, SenderId};

/// Maps each copy forwarded to the owner back to the sender who wrote it.
///
/// Bounded by `capacity` with least-recently-used eviction; a lookup counts
/// as a use. Capacity `None` keeps every entry for the process lifetime.
pub struct CorrelationTable {
    entries: Mutex<LruCache<CopyId, SenderId>>,
}

impl CorrelationTable {
    pub fn new(capacity: Option<NonZeroUsize>) -> Self {
        let cache = match capacity {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            entries: Mutex::new(cache),
        }
    }

    /// Build from a config value where 0 means unbounded.
    pub fn with_limit(limit: usize) -> Self {
        Self::new(NonZeroUsize::new(limit))
    }

    pub async fn insert(&self, copy: CopyId, sender: SenderId) {
        self.entries.lock().await.put(copy, sender);
    }

    /// Resolve a copy id. The entry stays in place.
    pub async fn resolve(&self, copy: CopyId) -> Option<SenderId> {
        self.entries.lock().await.get(&copy).copied()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
