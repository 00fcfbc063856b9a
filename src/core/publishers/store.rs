use crate::core::models::publisher::Publisher;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Authoritative publisher configuration source, typically a database.
/// The auction core only ever reads.
#[async_trait]
pub trait PublisherStore: Send + Sync {
    async fn get(&self, publisher_id: &str) -> Result<Option<Publisher>, anyhow::Error>;

    /// Readiness probe; a failing store flips `/health/ready` to 503.
    async fn ping(&self) -> Result<(), anyhow::Error>;
}

/// Shared key/value cache (e.g. Redis) sitting between the in-process
/// cache and the store. Strictly optional: any error here degrades to
/// the store.
#[async_trait]
pub trait KVCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error>;

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), anyhow::Error>;
}

/// Publisher store backed by the config file, for dev setups and tests.
/// Entries are normalized once at load.
pub struct ConfigPublisherStore {
    publishers: HashMap<String, Publisher>,
}

impl ConfigPublisherStore {
    pub fn new(publishers: Vec<Publisher>) -> Self {
        let publishers = publishers
            .into_iter()
            .map(|p| (p.id.clone(), p.normalized()))
            .collect();

        ConfigPublisherStore { publishers }
    }
}

#[async_trait]
impl PublisherStore for ConfigPublisherStore {
    async fn get(&self, publisher_id: &str) -> Result<Option<Publisher>, anyhow::Error> {
        Ok(self.publishers.get(publisher_id).cloned())
    }

    async fn ping(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
