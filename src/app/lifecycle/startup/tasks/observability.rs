use crate::app::lifecycle::context::StartupContext;
use crate::core::observability::provider;
use crate::core::pipeline::BlockingTask;
use anyhow::Error;
use tracing::info;

pub struct ConfigureObservabilityTask;

impl BlockingTask<StartupContext, Error> for ConfigureObservabilityTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context.config.get().ok_or_else(|| {
            anyhow::anyhow!("Config not loaded before observability initialization")
        })?;

        provider::init(&config.logging)?;

        info!("Hello world! Observability configured");

        Ok(())
    }
}
