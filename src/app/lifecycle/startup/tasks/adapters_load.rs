use crate::app::lifecycle::context::StartupContext;
use crate::core::adapters::ortb::OrtbAdapter;
use crate::core::adapters::registry::AdapterRegistryBuilder;
use crate::core::pipeline::BlockingTask;
use anyhow::Error;
use std::sync::Arc;
use tracing::{info, warn};

/// Explicit adapter registration at startup. Every configured partner
/// gets an adapter instance; bad entries are logged and skipped, never
/// panicked on.
pub struct AdaptersLoadTask;

impl BlockingTask<StartupContext, Error> for AdaptersLoadTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context
            .config
            .get()
            .ok_or_else(|| anyhow::anyhow!("Config not loaded before adapters"))?;

        let mut builder = AdapterRegistryBuilder::new();

        for partner in &config.partners {
            builder.register(Arc::new(OrtbAdapter::new(Arc::new(partner.clone()))));
        }

        let registry = builder.build();

        if registry.is_empty() {
            warn!("No demand partners configured; every auction will be a no-bid");
        } else {
            info!("Registered {} partner adapters", registry.len());
        }

        context
            .adapters
            .set(registry)
            .map_err(|_| anyhow::anyhow!("Adapter registry already set"))?;

        Ok(())
    }
}
