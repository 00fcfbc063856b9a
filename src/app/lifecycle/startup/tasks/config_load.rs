use crate::app::config::HbxConfig;
use crate::app::lifecycle::context::StartupContext;
use crate::core::pipeline::BlockingTask;
use anyhow::{Context, Error};
use std::sync::Arc;

pub(crate) struct ConfigLoadTask;

impl BlockingTask<StartupContext, Error> for ConfigLoadTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = HbxConfig::load(&context.config_path)
            .with_context(|| format!("Loading config from {}", context.config_path.display()))?;

        config.validate()?;

        println!(
            "Config loaded: {} partners, {} publishers",
            config.partners.len(),
            config.publishers.entries.len()
        );

        context
            .config
            .set(Arc::new(config))
            .map_err(|_| anyhow::anyhow!("Config already set on context"))?;

        Ok(())
    }
}
