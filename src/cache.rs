//! Small keyed TTL cache
//!
//! An explicit cache abstraction taking a key, a loader and a TTL, owned by
//! whichever component needs one. Nothing here is process-global.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Shared map of values that expire `ttl` after being loaded
#[derive(Clone)]
pub struct TtlCache<K, V> {
    entries: Arc<RwLock<HashMap<K, Entry<V>>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fresh value for the key, if any
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    /// Return the cached value or run the loader and cache its result.
    ///
    /// The lock is not held across the loader; concurrent misses may load
    /// twice, and the later insert wins. A loader error is returned as-is
    /// and nothing is cached.
    pub async fn get_or_load<F, Fut, E>(&self, key: K, ttl: Duration, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }

        let value = loader().await?;
        self.entries.write().await.insert(
            key,
            Entry {
                value: value.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(value)
    }

    pub async fn invalidate(&self, key: &K) {
        self.entries.write().await.remove(key);
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
