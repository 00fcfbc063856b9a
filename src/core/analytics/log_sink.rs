use crate::core::analytics::{AnalyticsSink, AuctionRecord};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Writes each record as a single JSON log line. The default sink for
/// local development.
pub struct LogSink;

#[async_trait]
impl AnalyticsSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, record: Arc<AuctionRecord>) -> Result<(), anyhow::Error> {
        info!(target: "hbx::analytics", "{}", serde_json::to_string(record.as_ref())?);
        Ok(())
    }
}
