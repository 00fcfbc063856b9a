//! Analytics fan-out. One enriched record per auction, handed to every
//! configured sink through a bounded drop-oldest queue. Enqueue never
//! blocks a coordinator; a slow sink sheds its own oldest records and
//! the drops show up in metrics.

pub mod http_sink;
pub mod log_sink;

use crate::core::models::auction::{
    ExclusionReason, MediaType, PartnerOutcome, RejectedBid,
};
use crate::core::observability::metrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpSummary {
    pub imp_id: String,
    pub media_types: Vec<MediaType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sizes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedPartner {
    pub partner: String,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinnerSummary {
    pub partner: String,
    pub imp_id: String,
    pub price: f64,
    pub adjusted_price: f64,
    pub clear_price: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrivacySummary {
    pub gdpr_applies: bool,
    pub consent_ok: bool,
    pub ccpa_applies: bool,
    pub coppa: bool,
}

/// The one record emitted per auction, after the response is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionRecord {
    pub auction_id: String,
    pub publisher_id: String,
    pub endpoint: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub imps: Vec<ImpSummary>,
    pub selected: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded: Vec<ExcludedPartner>,
    pub outcomes: Vec<PartnerOutcome>,
    pub winners: Vec<WinnerSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected_bids: Vec<RejectedBid>,
    pub privacy: PrivacySummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbr: Option<u32>,
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, record: Arc<AuctionRecord>) -> Result<(), anyhow::Error>;
}

struct BoundedQueue {
    items: Mutex<VecDeque<Arc<AuctionRecord>>>,
    capacity: usize,
    notify: Notify,
}

impl BoundedQueue {
    fn new(capacity: usize) -> Self {
        BoundedQueue {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
        }
    }

    /// Never blocks; a full queue sheds its oldest record and the
    /// caller's push always lands.
    fn push(&self, record: Arc<AuctionRecord>) -> bool {
        let mut items = self.items.lock();
        let mut dropped = false;

        if items.len() >= self.capacity {
            items.pop_front();
            dropped = true;
        }

        items.push_back(record);
        drop(items);

        self.notify.notify_one();
        !dropped
    }

    fn pop(&self) -> Option<Arc<AuctionRecord>> {
        self.items.lock().pop_front()
    }

    fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

struct SinkWorker {
    sink: Arc<dyn AnalyticsSink>,
    queue: Arc<BoundedQueue>,
}

/// Owns one background worker per sink. Emission clones the shared
/// record Arc onto every queue and returns immediately.
pub struct AnalyticsFanout {
    workers: Vec<SinkWorker>,
}

impl AnalyticsFanout {
    pub fn start(sinks: Vec<Arc<dyn AnalyticsSink>>, queue_size: usize) -> Self {
        let workers = sinks
            .into_iter()
            .map(|sink| {
                let queue = Arc::new(BoundedQueue::new(queue_size.max(1)));

                let worker_sink = sink.clone();
                let worker_queue = queue.clone();

                tokio::spawn(async move {
                    loop {
                        while let Some(record) = worker_queue.pop() {
                            if let Err(e) = worker_sink.deliver(record).await {
                                metrics::ANALYTICS_FAILURES
                                    .with_label_values(&[worker_sink.name()])
                                    .inc();
                                debug!("Analytics sink {} failed: {}", worker_sink.name(), e);
                            }
                        }

                        worker_queue.notify.notified().await;
                    }
                });

                SinkWorker { sink, queue }
            })
            .collect();

        AnalyticsFanout { workers }
    }

    pub fn emit(&self, record: AuctionRecord) {
        let record = Arc::new(record);

        for worker in &self.workers {
            if !worker.queue.push(record.clone()) {
                metrics::ANALYTICS_DROPPED
                    .with_label_values(&[worker.sink.name()])
                    .inc();
            }
        }
    }

    /// Best-effort drain used on shutdown.
    pub async fn flush(&self, timeout: std::time::Duration) {
        let deadline = tokio::time::Instant::now() + timeout;

        while self.workers.iter().any(|w| !w.queue.is_empty()) {
            if tokio::time::Instant::now() >= deadline {
                return;
            }

            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }
}
