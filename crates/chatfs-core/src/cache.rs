//! Time-expiring key-value store.
//!
//! Backs both listing snapshots and raw thumbnail bytes. Entries are
//! replaced wholesale on `set`; there is no size bound, only time expiry.
//! Expired entries stop being returned immediately and are reclaimed by a
//! background sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::model::VirtualNode;

/// Standing TTL used by [`ExpiringCache::set_default`].
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Interval of the background sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Concurrent TTL map. Cloning yields another handle to the same store.
#[derive(Debug, Clone)]
pub struct ExpiringCache<V> {
    entries: Arc<RwLock<HashMap<String, Entry<V>>>>,
    default_ttl: Duration,
}

impl<V: Clone + Send + Sync + 'static> ExpiringCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub async fn set_default(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl).await;
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_fresh(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    /// Number of stored entries, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Run [`purge_expired`](Self::purge_expired) every `every`, until the
    /// returned handle is aborted.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                cache.purge_expired().await;
            }
        })
    }
}

/// Values stored by the adapter. Listings and thumbnails live in disjoint
/// key namespaces of the same store.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Listing(Arc<Vec<VirtualNode>>),
    Thumbnail(Bytes),
}

pub type DriveCache = ExpiringCache<CachedValue>;

/// Key of the root listing.
pub const ROOT_KEY: &str = "root";

/// Key of the cached bytes of a message's thumbnail. Message ids are only
/// unique within one chat, so the peer token is part of the key.
pub fn thumbnail_key(peer: &str, message_id: i32) -> String {
    format!("thumbnail:{peer}:{message_id}")
}

impl DriveCache {
    pub async fn listing(&self, key: &str) -> Option<Arc<Vec<VirtualNode>>> {
        match self.get(key).await? {
            CachedValue::Listing(nodes) => Some(nodes),
            CachedValue::Thumbnail(_) => None,
        }
    }

    pub async fn thumbnail(&self, peer: &str, message_id: i32) -> Option<Bytes> {
        match self.get(&thumbnail_key(peer, message_id)).await? {
            CachedValue::Thumbnail(bytes) => Some(bytes),
            CachedValue::Listing(_) => None,
        }
    }
}
