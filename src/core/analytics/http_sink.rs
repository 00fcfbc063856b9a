use crate::core::analytics::{AnalyticsSink, AuctionRecord};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Forwards auction records as JSON POSTs to a collector endpoint.
pub struct HttpSink {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpSink {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(8)
            .build()
            .context("Failed building analytics http client")?;

        Ok(HttpSink {
            name: name.into(),
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl AnalyticsSink for HttpSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, record: Arc<AuctionRecord>) -> Result<(), anyhow::Error> {
        let body = serde_json::to_vec(record.as_ref())?;

        self.client
            .post(&self.url)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .context("Analytics forward failed")?
            .error_for_status()
            .context("Analytics collector rejected record")?;

        Ok(())
    }
}
