//! TTL-based read-through cache for market profiles.
//!
//! Entries are computed on miss, stored with a fixed TTL, and served
//! unchanged until expiry - stale-but-unexpired entries are never
//! revalidated. Keys are normalized `(concept, location)` pairs so the
//! same segment always maps to the same entry.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A concurrent TTL cache.
///
/// Readers never contend with each other; writers to distinct keys only
/// contend on the map lock. Same-key writes race under last-write-wins,
/// which is acceptable because a key is only written by one logical run
/// at a time.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache with a fixed TTL for every entry.
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        })
    }

    /// Get an unexpired entry.
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if Instant::now() < entry.expires_at {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Insert a value, resetting its TTL. Expired entries are purged
    /// opportunistically while the write lock is held.
    pub async fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Read-through: serve an unexpired hit, otherwise compute, store and
    /// return. The computation runs without holding the lock.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(hit) = self.get(&key).await {
            debug!("Cache hit");
            return hit;
        }
        let value = compute().await;
        self.insert(key, value.clone()).await;
        value
    }

    /// Number of entries, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Normalize a `(concept, location)` pair into a cache key.
///
/// Uppercased, with a GLOBAL default for missing locations, mirroring the
/// deterministic market-fencing keys of the profiling service.
pub fn market_key(concept: &str, location: Option<&str>) -> (String, String) {
    let concept = concept.trim();
    let concept = if concept.is_empty() { "OTHER" } else { concept };
    let location = location
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or("GLOBAL");
    (concept.to_uppercase(), location.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_no_recompute() {
        let cache: Arc<TtlCache<(String, String), String>> =
            TtlCache::new(Duration::from_secs(60));
        let computed = AtomicU32::new(0);
        let key = market_key("fintech", Some("london"));

        let first = cache
            .get_or_compute(key.clone(), || async {
                computed.fetch_add(1, Ordering::SeqCst);
                "profile".to_string()
            })
            .await;

        tokio::time::advance(Duration::from_secs(30)).await;

        let second = cache
            .get_or_compute(key.clone(), || async {
                computed.fetch_add(1, Ordering::SeqCst);
                "different".to_string()
            })
            .await;

        // Identical output, single upstream computation.
        assert_eq!(first, second);
        assert_eq!(computed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_recomputes() {
        let cache: Arc<TtlCache<(String, String), u32>> = TtlCache::new(Duration::from_secs(60));
        let key = market_key("saas", None);

        let first = cache.get_or_compute(key.clone(), || async { 1 }).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        let second = cache.get_or_compute(key.clone(), || async { 2 }).await;

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_purges_expired() {
        let cache: Arc<TtlCache<u32, u32>> = TtlCache::new(Duration::from_secs(10));
        cache.insert(1, 1).await;
        cache.insert(2, 2).await;
        tokio::time::advance(Duration::from_secs(11)).await;
        cache.insert(3, 3).await;
        assert_eq!(cache.len().await, 1);
    }

    #[test]
    fn test_market_key_normalization() {
        assert_eq!(
            market_key("Fintech", Some("London")),
            ("FINTECH".to_string(), "LONDON".to_string())
        );
        assert_eq!(market_key("", None), ("OTHER".to_string(), "GLOBAL".to_string()));
        assert_eq!(market_key("saas", Some("  ")), ("SAAS".to_string(), "GLOBAL".to_string()));
    }
}
