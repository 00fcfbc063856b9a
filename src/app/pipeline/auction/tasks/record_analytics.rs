use crate::app::pipeline::auction::AuctionContext;
use crate::child_span_info;
use crate::core::analytics::{
    AnalyticsFanout, AuctionRecord, ExcludedPartner, ImpSummary, PrivacySummary, WinnerSummary,
};
use crate::core::models::auction::{MediaType, PartnerOutcome};
use crate::core::observability::metrics;
use crate::core::pipeline::AsyncTask;
use crate::core::privacy::Regulation;
use crate::core::spec::response_state::BidResponseState;
use anyhow::Error;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::Instrument;

/// Finalizer: builds the one analytics record per auction and hands it
/// to the fan-out. Runs whether or not the auction pipeline completed,
/// after the response is constructed and before it is written.
pub struct RecordAnalyticsTask {
    fanout: Arc<AnalyticsFanout>,
}

impl RecordAnalyticsTask {
    pub fn new(fanout: Arc<AnalyticsFanout>) -> Self {
        Self { fanout }
    }

    fn imp_summaries(context: &AuctionContext) -> Vec<ImpSummary> {
        context
            .req
            .read()
            .imp
            .iter()
            .map(|imp| {
                let mut media_types = Vec::new();
                let mut sizes = Vec::new();

                if let Some(banner) = &imp.banner {
                    media_types.push(MediaType::Banner);
                    sizes.extend(banner.format.iter().map(|f| format!("{}x{}", f.w, f.h)));
                }
                if let Some(video) = &imp.video {
                    media_types.push(MediaType::Video);
                    if video.w > 0 && video.h > 0 {
                        sizes.push(format!("{}x{}", video.w, video.h));
                    }
                }
                if imp.native.is_some() {
                    media_types.push(MediaType::Native);
                }
                if imp.audio.is_some() {
                    media_types.push(MediaType::Audio);
                }

                ImpSummary {
                    imp_id: imp.id.clone(),
                    media_types,
                    sizes,
                }
            })
            .collect()
    }

    fn privacy_summary(context: &AuctionContext) -> PrivacySummary {
        match context.posture.get() {
            Some(posture) => PrivacySummary {
                gdpr_applies: posture.regulation == Regulation::Gdpr,
                consent_ok: posture.consent_ok,
                ccpa_applies: posture.regulation == Regulation::Ccpa,
                coppa: posture.regulation == Regulation::Coppa,
            },
            None => PrivacySummary::default(),
        }
    }

    async fn build_record(&self, context: &AuctionContext) -> AuctionRecord {
        let partners = context.partners.lock().await;

        let selected: Vec<String> = partners.iter().map(|p| p.partner.code.clone()).collect();

        let outcomes: Vec<PartnerOutcome> = partners
            .iter()
            .map(|p| {
                p.outcome.get().cloned().unwrap_or_else(|| PartnerOutcome {
                    partner: p.partner.code.clone(),
                    ..Default::default()
                })
            })
            .collect();

        drop(partners);

        let excluded = context
            .exclusions
            .lock()
            .iter()
            .map(|(partner, reason)| ExcludedPartner {
                partner: partner.clone(),
                reason: *reason,
            })
            .collect();

        let winners = context
            .winners
            .get()
            .map(|winners| {
                winners
                    .iter()
                    .map(|w| WinnerSummary {
                        partner: w.bid.partner.clone(),
                        imp_id: w.bid.imp_id.clone(),
                        price: w.bid.price,
                        adjusted_price: w.bid.adjusted_price,
                        clear_price: w.clear_price,
                        currency: w.bid.currency.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let nbr = match context.res.get() {
            Some(BidResponseState::NoBidReason { nbr, .. }) => Some(*nbr),
            _ => None,
        };

        AuctionRecord {
            auction_id: context.original_auction_id.clone(),
            publisher_id: context.account_id.clone(),
            endpoint: context.source.clone(),
            timestamp: Utc::now(),
            duration_ms: context.duration_ms(),
            imps: Self::imp_summaries(context),
            selected,
            excluded,
            outcomes,
            winners,
            rejected_bids: context.rejected_bids.lock().clone(),
            privacy: Self::privacy_summary(context),
            validation_errors: context.validation_errors.lock().clone(),
            nbr,
        }
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let record = self.build_record(context).await;

        let outcome = match context.res.get() {
            Some(BidResponseState::Bid(_)) => "bid",
            Some(_) => "no_bid",
            None => "aborted",
        };

        metrics::AUCTIONS_TOTAL
            .with_label_values(&[&context.source, outcome])
            .inc();
        metrics::AUCTION_DURATION
            .with_label_values(&[&context.source])
            .observe(context.started_at.elapsed().as_secs_f64());

        // dispatched, never awaited against the response path
        self.fanout.emit(record);

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for RecordAnalyticsTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("record_analytics_task");

        self.run0(context).instrument(span).await
    }
}
