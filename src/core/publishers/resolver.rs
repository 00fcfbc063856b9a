use crate::core::models::publisher::Publisher;
use crate::core::publishers::store::{KVCache, PublisherStore};
use moka::sync::Cache;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const KV_PREFIX: &str = "pub:";

#[derive(Debug)]
pub enum ResolveError {
    NotFound,
    UnauthorizedDomain,
    Store(anyhow::Error),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound => write!(f, "publisher not found"),
            ResolveError::UnauthorizedDomain => write!(f, "domain not in publisher allow list"),
            ResolveError::Store(e) => write!(f, "publisher store error: {}", e),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Read-through publisher lookup: in-process TTL cache, then shared KV,
/// then the authoritative store. KV problems are never fatal; the
/// resolver degrades to the store with a warning.
pub struct PublisherResolver {
    cache: Cache<String, Arc<Publisher>>,
    kv: Option<Arc<dyn KVCache>>,
    store: Arc<dyn PublisherStore>,
    kv_ttl: Duration,
}

impl PublisherResolver {
    pub fn new(
        store: Arc<dyn PublisherStore>,
        kv: Option<Arc<dyn KVCache>>,
        cache_ttl: Duration,
        cache_capacity: u64,
    ) -> Self {
        PublisherResolver {
            cache: Cache::builder()
                .time_to_live(cache_ttl)
                .max_capacity(cache_capacity)
                .build(),
            kv,
            store,
            // KV entries outlive the local cache so a warm replica can
            // feed a cold one
            kv_ttl: cache_ttl * 10,
        }
    }

    /// Resolves a publisher and, when a domain is given, authorizes it
    /// against the allow list before anything else happens with the
    /// request.
    pub async fn get(
        &self,
        publisher_id: &str,
        domain: Option<&str>,
    ) -> Result<Arc<Publisher>, ResolveError> {
        let publisher = self.load(publisher_id).await?;

        if let Some(domain) = domain {
            if !publisher.domain_allowed(domain) {
                return Err(ResolveError::UnauthorizedDomain);
            }
        }

        Ok(publisher)
    }

    async fn load(&self, publisher_id: &str) -> Result<Arc<Publisher>, ResolveError> {
        if let Some(publisher) = self.cache.get(publisher_id) {
            return Ok(publisher);
        }

        if let Some(publisher) = self.load_kv(publisher_id).await {
            self.cache.insert(publisher_id.to_string(), publisher.clone());
            return Ok(publisher);
        }

        let publisher = self
            .store
            .get(publisher_id)
            .await
            .map_err(ResolveError::Store)?
            .ok_or(ResolveError::NotFound)?
            .normalized();

        let publisher = Arc::new(publisher);
        self.cache.insert(publisher_id.to_string(), publisher.clone());
        self.store_kv(publisher_id, &publisher).await;

        Ok(publisher)
    }

    async fn load_kv(&self, publisher_id: &str) -> Option<Arc<Publisher>> {
        let kv = self.kv.as_ref()?;

        match kv.get(&format!("{}{}", KV_PREFIX, publisher_id)).await {
            Ok(Some(raw)) => match serde_json::from_str::<Publisher>(&raw) {
                Ok(publisher) => {
                    debug!("Publisher {} served from kv cache", publisher_id);
                    Some(Arc::new(publisher.normalized()))
                }
                Err(e) => {
                    warn!("Corrupt kv entry for publisher {}: {}", publisher_id, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                // no hard dependency on the kv tier
                warn!("KV cache unavailable, falling back to store: {}", e);
                None
            }
        }
    }

    async fn store_kv(&self, publisher_id: &str, publisher: &Publisher) {
        let Some(kv) = self.kv.as_ref() else {
            return;
        };

        let Ok(raw) = serde_json::to_string(publisher) else {
            return;
        };

        if let Err(e) = kv
            .put(&format!("{}{}", KV_PREFIX, publisher_id), &raw, self.kv_ttl)
            .await
        {
            warn!("KV cache write failed for publisher {}: {}", publisher_id, e);
        }
    }

    /// Admin-mutation hook: drops the in-process entry so the next
    /// lookup re-reads through.
    pub fn invalidate(&self, publisher_id: &str) {
        self.cache.invalidate(publisher_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::publisher::PublisherStatus;
    use crate::core::publishers::store::ConfigPublisherStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn active_publisher(id: &str) -> Publisher {
        Publisher {
            id: id.to_string(),
            status: PublisherStatus::Active,
            allowed_domains: vec!["example.com".to_string()],
            bid_multiplier: 1.0,
            ..Default::default()
        }
    }

    struct CountingStore {
        inner: ConfigPublisherStore,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PublisherStore for CountingStore {
        async fn get(&self, publisher_id: &str) -> Result<Option<Publisher>, anyhow::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get(publisher_id).await
        }

        async fn ping(&self) -> Result<(), anyhow::Error> {
            Ok(())
        }
    }

    struct MemoryKv {
        map: Mutex<HashMap<String, String>>,
        fail: bool,
    }

    #[async_trait]
    impl KVCache for MemoryKv {
        async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
            if self.fail {
                anyhow::bail!("kv down");
            }
            Ok(self.map.lock().get(key).cloned())
        }

        async fn put(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), anyhow::Error> {
            if self.fail {
                anyhow::bail!("kv down");
            }
            self.map.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    fn counting_store(publishers: Vec<Publisher>) -> Arc<CountingStore> {
        Arc::new(CountingStore {
            inner: ConfigPublisherStore::new(publishers),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_lookups() {
        let store = counting_store(vec![active_publisher("p-A")]);
        let resolver = PublisherResolver::new(
            store.clone(),
            None,
            Duration::from_secs(30),
            1000,
        );

        let first = resolver.get("p-A", None).await.unwrap();
        let second = resolver.get("p-A", None).await.unwrap();

        // referentially transparent within the ttl window
        assert_eq!(first.id, second.id);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_publisher() {
        let resolver = PublisherResolver::new(
            counting_store(vec![]),
            None,
            Duration::from_secs(30),
            1000,
        );

        assert!(matches!(
            resolver.get("ghost", None).await,
            Err(ResolveError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_domain_authorization() {
        let resolver = PublisherResolver::new(
            counting_store(vec![active_publisher("p-A")]),
            None,
            Duration::from_secs(30),
            1000,
        );

        assert!(resolver.get("p-A", Some("example.com")).await.is_ok());
        assert!(matches!(
            resolver.get("p-A", Some("evil.test")).await,
            Err(ResolveError::UnauthorizedDomain)
        ));
    }

    #[tokio::test]
    async fn test_kv_failure_degrades_to_store() {
        let store = counting_store(vec![active_publisher("p-A")]);
        let kv = Arc::new(MemoryKv {
            map: Mutex::new(HashMap::new()),
            fail: true,
        });

        let resolver =
            PublisherResolver::new(store.clone(), Some(kv), Duration::from_secs(30), 1000);

        assert!(resolver.get("p-A", None).await.is_ok());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_kv_read_through_after_invalidation() {
        let store = counting_store(vec![active_publisher("p-A")]);
        let kv = Arc::new(MemoryKv {
            map: Mutex::new(HashMap::new()),
            fail: false,
        });

        let resolver = PublisherResolver::new(
            store.clone(),
            Some(kv.clone()),
            Duration::from_secs(30),
            1000,
        );

        resolver.get("p-A", None).await.unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        // local entry dropped; the kv tier still has it, so the store
        // is not consulted again
        resolver.invalidate("p-A");
        resolver.get("p-A", None).await.unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}
