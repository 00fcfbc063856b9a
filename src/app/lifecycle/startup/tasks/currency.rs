use crate::app::lifecycle::context::StartupContext;
use crate::core::currency::CurrencyService;
use crate::core::pipeline::AsyncTask;
use anyhow::Error;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Builds the currency service and starts its refresh worker. Server
/// start never waits on the first fetch; conversion errors until the
/// table lands are handled per bid.
pub struct CurrencyTask;

#[async_trait]
impl AsyncTask<StartupContext, Error> for CurrencyTask {
    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context
            .config
            .get()
            .ok_or_else(|| anyhow::anyhow!("Config not loaded before currency service"))?;

        let service = Arc::new(CurrencyService::new(config.currency.clone())?);

        if let Some(worker) = service.clone().spawn_refresh() {
            context
                .currency_worker
                .set(worker)
                .map_err(|_| anyhow::anyhow!("Currency worker already set"))?;
        }

        info!(
            "Currency service up, base {}, initialized: {}",
            service.base(),
            service.initialized()
        );

        context
            .currency
            .set(service)
            .map_err(|_| anyhow::anyhow!("Currency service already set"))?;

        Ok(())
    }
}
