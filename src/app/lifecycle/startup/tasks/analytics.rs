use crate::app::config::AnalyticsSinkConfig;
use crate::app::lifecycle::context::StartupContext;
use crate::core::analytics::http_sink::HttpSink;
use crate::core::analytics::log_sink::LogSink;
use crate::core::analytics::{AnalyticsFanout, AnalyticsSink};
use crate::core::pipeline::AsyncTask;
use anyhow::Error;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Starts one background worker per configured analytics sink. A sink
/// that fails to construct is skipped; auctions never depend on
/// analytics being healthy.
pub struct AnalyticsTask;

#[async_trait]
impl AsyncTask<StartupContext, Error> for AnalyticsTask {
    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context
            .config
            .get()
            .ok_or_else(|| anyhow::anyhow!("Config not loaded before analytics"))?;

        let mut sinks: Vec<Arc<dyn AnalyticsSink>> = Vec::new();

        for sink_cfg in &config.analytics.sinks {
            match sink_cfg {
                AnalyticsSinkConfig::Log => sinks.push(Arc::new(LogSink)),
                AnalyticsSinkConfig::Http { url } => match HttpSink::new("http", url.clone()) {
                    Ok(sink) => sinks.push(Arc::new(sink)),
                    Err(e) => warn!("Skipping http analytics sink: {:#}", e),
                },
            }
        }

        info!("Analytics fanout up with {} sinks", sinks.len());

        let fanout = AnalyticsFanout::start(sinks, config.analytics.queue_size);

        context
            .analytics
            .set(Arc::new(fanout))
            .map_err(|_| anyhow::anyhow!("Analytics fanout already set"))?;

        Ok(())
    }
}
