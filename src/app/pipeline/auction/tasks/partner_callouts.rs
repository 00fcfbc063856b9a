use crate::app::pipeline::auction::AuctionContext;
use crate::app::pipeline::auction::context::PartnerContext;
use crate::child_span_info;
use crate::core::adapters::RawResponse;
use crate::core::demand::client::DemandClient;
use crate::core::models::auction::{PartnerOutcome, TypedBid};
use crate::core::observability::metrics;
use crate::core::pipeline::AsyncTask;
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{Instrument, Span, debug};

enum CallResult {
    Timeout,
    Transport(String),
    Raw(RawResponse),
}

/// Fans out to every selected partner concurrently under the shared
/// auction deadline. A slow or broken partner costs the auction
/// nothing but its own absence; late responses are cancelled and
/// discarded, fully parsed or not.
pub struct PartnerCalloutsTask {
    client: Arc<DemandClient>,
}

impl PartnerCalloutsTask {
    pub fn new(client: DemandClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    async fn dispatch(
        client: &DemandClient,
        pc: &PartnerContext,
        deadline: tokio::time::Instant,
    ) {
        let code = pc.partner.code.as_str();
        let started = std::time::Instant::now();

        let (calls, adapter_errors) = pc.adapter.make_requests(&pc.req);
        let mut errors: Vec<String> = adapter_errors.iter().map(|e| e.to_string()).collect();

        if calls.is_empty() {
            // nothing dispatched; release the circuit slot uncharged
            pc.circuit.record_success();
            metrics::PARTNER_REQUESTS
                .with_label_values(&[code, "no_call"])
                .inc();

            let _ = pc.outcome.set(PartnerOutcome {
                partner: code.to_string(),
                errors,
                ..Default::default()
            });
            let _ = pc.bids.set(Vec::new());
            return;
        }

        let results = join_all(calls.iter().map(|call| async {
            let budget = deadline.saturating_duration_since(tokio::time::Instant::now());

            if budget.is_zero() {
                return CallResult::Timeout;
            }

            match tokio::time::timeout_at(
                deadline,
                client.send(pc.partner.protocol.clone(), call, budget),
            )
            .await
            {
                Err(_) => CallResult::Timeout,
                Ok(Err(e)) => CallResult::Transport(e.to_string()),
                Ok(Ok(raw)) => CallResult::Raw(raw),
            }
        }))
        .await;

        let mut timed_out = false;
        let mut transport_failed = false;
        let mut server_error = false;
        let mut http_status: Option<u32> = None;
        let mut bids: Vec<TypedBid> = Vec::new();

        for result in results {
            match result {
                CallResult::Timeout => timed_out = true,
                CallResult::Transport(message) => {
                    transport_failed = true;
                    errors.push(message);
                }
                CallResult::Raw(raw) => {
                    http_status = Some(raw.status);

                    if raw.status >= 500 {
                        server_error = true;
                        errors.push(format!("Partner answered http {}", raw.status));
                    } else if raw.status == 200 || raw.status == 204 {
                        let (partner_bids, decode_errors) = pc.adapter.make_bids(&pc.req, &raw);

                        bids.extend(partner_bids.bids);
                        errors.extend(decode_errors.iter().map(|e| e.to_string()));
                    } else {
                        errors.push(format!("Partner answered http {}", raw.status));
                    }
                }
            }
        }

        let latency = started.elapsed();

        if timed_out || transport_failed || server_error {
            pc.circuit.record_failure();
        } else {
            pc.circuit.record_success();
        }

        let outcome_label = if timed_out {
            "timeout"
        } else if transport_failed {
            "transport_error"
        } else if server_error || http_status.map(|s| s >= 400).unwrap_or(false) {
            "http_error"
        } else if bids.is_empty() {
            "no_bid"
        } else {
            "bid"
        };

        metrics::PARTNER_REQUESTS
            .with_label_values(&[code, outcome_label])
            .inc();
        metrics::PARTNER_LATENCY
            .with_label_values(&[code])
            .observe(latency.as_secs_f64());

        debug!(
            "Partner {} finished {} with {} bids in {}ms",
            code,
            outcome_label,
            bids.len(),
            latency.as_millis()
        );

        let _ = pc.outcome.set(PartnerOutcome {
            partner: code.to_string(),
            latency_ms: latency.as_millis() as u64,
            http_status,
            bid_count: bids.len() as u32,
            timed_out,
            errors,
        });
        let _ = pc.bids.set(bids);
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let deadline = *context
            .deadline
            .get()
            .ok_or_else(|| anyhow!("No deadline assigned before callouts"))?;

        let partners = context.partners.lock().await;

        join_all(
            partners
                .iter()
                .map(|pc| Self::dispatch(&self.client, pc, deadline)),
        )
        .await;

        let span = Span::current();
        span.record("partners_called", partners.len());
        span.record(
            "bids_received",
            partners
                .iter()
                .map(|p| p.bids.get().map(|b| b.len()).unwrap_or(0))
                .sum::<usize>(),
        );

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for PartnerCalloutsTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!(
            "partner_callouts_task",
            partners_called = tracing::field::Empty,
            bids_received = tracing::field::Empty
        );

        self.run0(context).instrument(span).await
    }
}
