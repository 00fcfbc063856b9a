use crate::app::lifecycle::context::StartupContext;
use crate::core::pipeline::AsyncTask;
use anyhow::Error;
use async_trait::async_trait;
use std::time::Duration;

/// Drains the analytics queues before exit so records from the last
/// in-flight auctions are not lost, bounded by the configured flush
/// timeout. Also parks the currency refresh worker.
pub(crate) struct FlushAnalyticsTask;

#[async_trait]
impl AsyncTask<StartupContext, anyhow::Error> for FlushAnalyticsTask {
    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        if let Some(worker) = context.currency_worker.get() {
            worker.abort();
        }

        let Some(fanout) = context.analytics.get() else {
            return Ok(());
        };

        let timeout = context
            .config
            .get()
            .map(|c| c.analytics.flush_timeout)
            .unwrap_or(Duration::from_secs(5));

        println!("Flushing analytics queues..");
        fanout.flush(timeout).await;
        println!("Analytics flushed.");

        Ok(())
    }
}
