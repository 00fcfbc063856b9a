use crate::app::lifecycle::context::StartupContext;
use crate::core::pipeline::BlockingTask;
use crate::core::publishers::{ConfigPublisherStore, PublisherResolver, PublisherStore};
use anyhow::Error;
use std::sync::Arc;
use tracing::info;

/// Wires the publisher store and the read-through resolver. The config
/// store is authoritative here; a deployment swaps in its database
/// store and optional KV tier at this seam.
pub struct PublishersLoadTask;

impl BlockingTask<StartupContext, Error> for PublishersLoadTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context
            .config
            .get()
            .ok_or_else(|| anyhow::anyhow!("Config not loaded before publishers"))?;

        let store: Arc<dyn PublisherStore> = Arc::new(ConfigPublisherStore::new(
            config.publishers.entries.clone(),
        ));

        let resolver = PublisherResolver::new(
            store.clone(),
            None,
            config.publishers.cache_ttl,
            config.publishers.cache_capacity,
        );

        info!(
            "Publisher resolver up with {} configured accounts, cache ttl {:?}",
            config.publishers.entries.len(),
            config.publishers.cache_ttl
        );

        context
            .store
            .set(store)
            .map_err(|_| anyhow::anyhow!("Publisher store already set"))?;

        context
            .resolver
            .set(Arc::new(resolver))
            .map_err(|_| anyhow::anyhow!("Publisher resolver already set"))?;

        Ok(())
    }
}
