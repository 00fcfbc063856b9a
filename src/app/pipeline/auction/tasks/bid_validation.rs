use crate::app::pipeline::auction::AuctionContext;
use crate::child_span_info;
use crate::core::auction::floors;
use crate::core::currency::{ConvertError, CurrencyService};
use crate::core::models::auction::{BidRejectReason, RejectedBid, TypedBid};
use crate::core::observability::metrics;
use crate::core::pipeline::AsyncTask;
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Instrument, Span, debug, warn};

/// Normalizes every returned bid into the exchange default currency,
/// applies the publisher multiplier, and enforces floors and creative
/// requirements. Rejected bids are recorded, never silently dropped.
pub struct BidValidationTask {
    currency: Arc<CurrencyService>,
    require_adomain: bool,
}

impl BidValidationTask {
    pub fn new(currency: Arc<CurrencyService>, require_adomain: bool) -> Self {
        Self {
            currency,
            require_adomain,
        }
    }

    fn reject(context: &AuctionContext, bid: &TypedBid, reason: BidRejectReason) {
        metrics::BIDS_DROPPED
            .with_label_values(&[&reason.to_string()])
            .inc();

        context.rejected_bids.lock().push(RejectedBid {
            partner: bid.partner.clone(),
            imp_id: bid.imp_id.clone(),
            price: bid.price,
            reason,
        });
    }

    /// Converted per-imp floors, computed once per auction. A floor in
    /// an unconvertible currency falls back to its raw value with a
    /// recorded validation error rather than killing the impression.
    fn compute_floors(&self, context: &AuctionContext) -> HashMap<String, f64> {
        let req = context.req.read();
        let mut out = HashMap::with_capacity(req.imp.len());

        for imp in &req.imp {
            let floor = match floors::imp_floor(&self.currency, imp) {
                Ok(floor) => floor,
                Err(e) => {
                    warn!("Floor conversion failed for imp {}: {}", imp.id, e);
                    context.validation_errors.lock().push(format!(
                        "Floor for imp {} kept in {}: {}",
                        imp.id, imp.bidfloorcur, e
                    ));
                    imp.bidfloor
                }
            };

            out.insert(imp.id.clone(), floor);
        }

        out
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let publisher = context
            .publisher
            .get()
            .ok_or_else(|| anyhow!("No publisher on context during bid validation"))?;

        let multiplier = publisher.bid_multiplier;
        let base = self.currency.base().to_string();

        let imp_floors = self.compute_floors(context);
        let _ = context.floors.set(imp_floors.clone());

        let partners = context.partners.lock().await;
        let mut accepted = 0usize;
        let mut rejected = 0usize;

        for pc in partners.iter() {
            let Some(bids) = pc.bids.get() else {
                continue;
            };

            for bid in bids {
                let mut bid = bid.clone();

                let Some(imp_floor) = imp_floors.get(&bid.imp_id).copied() else {
                    Self::reject(context, &bid, BidRejectReason::UnknownImp);
                    rejected += 1;
                    continue;
                };

                match self.currency.convert(bid.price, &bid.currency, &base) {
                    Ok(converted) => {
                        bid.converted_price = converted;
                        bid.currency = base.clone();
                    }
                    Err(ConvertError::NotInitialized) => {
                        // no table yet: retain in original currency, flagged
                        context.validation_errors.lock().push(format!(
                            "Currency table uninitialized; bid from {} retained in {}",
                            bid.partner, bid.currency
                        ));
                        bid.converted_price = bid.price;
                    }
                    Err(e @ ConvertError::UnknownCurrency(_)) => {
                        debug!("Dropping bid from {}: {}", bid.partner, e);
                        Self::reject(context, &bid, BidRejectReason::CurrencyUnconvertible);
                        rejected += 1;
                        continue;
                    }
                }

                bid.adjusted_price = bid.converted_price * multiplier;

                if bid.adm.is_empty() && bid.nurl.is_empty() {
                    Self::reject(context, &bid, BidRejectReason::EmptyCreative);
                    rejected += 1;
                    continue;
                }

                if self.require_adomain && bid.adomain.is_empty() {
                    Self::reject(context, &bid, BidRejectReason::MissingAdomain);
                    rejected += 1;
                    continue;
                }

                let floor = floors::effective_floor(
                    imp_floor,
                    publisher.floor_adjustment(&bid.partner),
                );

                if bid.converted_price < floor {
                    Self::reject(context, &bid, BidRejectReason::BelowFloor);
                    rejected += 1;
                    continue;
                }

                accepted += 1;
                context.candidates.lock().push(bid);
            }
        }

        let span = Span::current();
        span.record("bids_accepted", accepted);
        span.record("bids_rejected", rejected);

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for BidValidationTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!(
            "bid_validation_task",
            bids_accepted = tracing::field::Empty,
            bids_rejected = tracing::field::Empty
        );

        self.run0(context).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::auction::context::PartnerContext;
    use crate::core::adapters::ortb::OrtbAdapter;
    use crate::core::breaker::{BreakerConfig, CircuitBreaker};
    use crate::core::currency::CurrencyConfig;
    use crate::core::models::partner::PartnerBuilder;
    use crate::core::models::publisher::{Publisher, PublisherStatus};
    use crate::core::spec::openrtb::{Banner, BidRequest, Imp, Site};
    use std::sync::OnceLock;

    fn currency() -> Arc<CurrencyService> {
        let mut cfg = CurrencyConfig::default();
        cfg.static_rates.insert("EUR".to_string(), 1.0 / 1.08);
        Arc::new(CurrencyService::new(cfg).unwrap())
    }

    fn typed_bid(partner: &str, imp: &str, price: f64, cur: &str) -> TypedBid {
        TypedBid {
            partner: partner.to_string(),
            imp_id: imp.to_string(),
            price,
            currency: cur.to_string(),
            creative_id: "c1".to_string(),
            adm: "<div/>".to_string(),
            adomain: vec!["adv.com".to_string()],
            ..Default::default()
        }
    }

    fn context_with_bids(publisher: Publisher, bids: Vec<TypedBid>) -> AuctionContext {
        let req = BidRequest {
            id: "r-1".to_string(),
            imp: vec![Imp {
                id: "1".to_string(),
                banner: Some(Banner::default()),
                ..Default::default()
            }],
            site: Some(Site {
                domain: "example.com".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let context =
            AuctionContext::new("/openrtb2/auction".to_string(), "p-A".to_string(), req);
        context.publisher.set(Arc::new(publisher)).ok().unwrap();

        let partner = Arc::new(
            PartnerBuilder::default()
                .code("x".to_string())
                .endpoint("https://bid.x.test".to_string())
                .build()
                .unwrap(),
        );

        let pc = PartnerContext {
            partner: partner.clone(),
            adapter: Arc::new(OrtbAdapter::new(partner)),
            circuit: Arc::new(CircuitBreaker::new("x", BreakerConfig::default())),
            req: context.req.read().clone(),
            outcome: OnceLock::new(),
            bids: OnceLock::new(),
        };
        pc.bids.set(bids).ok().unwrap();

        *context.partners.try_lock().unwrap() = vec![pc];
        context
    }

    fn active_publisher(multiplier: f64) -> Publisher {
        Publisher {
            id: "p-A".to_string(),
            status: PublisherStatus::Active,
            bid_multiplier: multiplier,
            ..Default::default()
        }
        .normalized()
    }

    #[tokio::test]
    async fn test_currency_conversion_and_multiplier() {
        let context = context_with_bids(
            active_publisher(1.0),
            vec![typed_bid("x", "1", 2.00, "EUR")],
        );

        BidValidationTask::new(currency(), true)
            .run0(&context)
            .await
            .unwrap();

        let candidates = context.candidates.lock();
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].converted_price - 2.16).abs() < 1e-9);
        assert_eq!(candidates[0].currency, "USD");
    }

    #[tokio::test]
    async fn test_unknown_currency_rejected() {
        let context = context_with_bids(
            active_publisher(1.0),
            vec![typed_bid("x", "1", 2.00, "XXX")],
        );

        BidValidationTask::new(currency(), true)
            .run0(&context)
            .await
            .unwrap();

        assert!(context.candidates.lock().is_empty());
        assert_eq!(
            context.rejected_bids.lock()[0].reason,
            BidRejectReason::CurrencyUnconvertible
        );
    }

    #[tokio::test]
    async fn test_below_floor_rejected() {
        let mut publisher = active_publisher(1.0);
        publisher.floor_adjustments.insert("x".to_string(), 3.0);

        let context =
            context_with_bids(publisher, vec![typed_bid("x", "1", 2.50, "USD")]);

        BidValidationTask::new(currency(), true)
            .run0(&context)
            .await
            .unwrap();

        assert!(context.candidates.lock().is_empty());
        assert_eq!(
            context.rejected_bids.lock()[0].reason,
            BidRejectReason::BelowFloor
        );
    }

    #[tokio::test]
    async fn test_missing_adomain_rejected_when_required() {
        let mut bid = typed_bid("x", "1", 2.50, "USD");
        bid.adomain.clear();

        let context = context_with_bids(active_publisher(1.0), vec![bid.clone()]);
        BidValidationTask::new(currency(), true)
            .run0(&context)
            .await
            .unwrap();
        assert!(context.candidates.lock().is_empty());

        let context = context_with_bids(active_publisher(1.0), vec![bid]);
        BidValidationTask::new(currency(), false)
            .run0(&context)
            .await
            .unwrap();
        assert_eq!(context.candidates.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_creative_rejected() {
        let mut bid = typed_bid("x", "1", 2.50, "USD");
        bid.adm.clear();
        bid.nurl.clear();

        let context = context_with_bids(active_publisher(1.0), vec![bid]);
        BidValidationTask::new(currency(), true)
            .run0(&context)
            .await
            .unwrap();

        assert_eq!(
            context.rejected_bids.lock()[0].reason,
            BidRejectReason::EmptyCreative
        );
    }

    #[tokio::test]
    async fn test_uninitialized_currency_retains_flagged() {
        let empty = Arc::new(CurrencyService::new(CurrencyConfig::default()).unwrap());
        let context = context_with_bids(
            active_publisher(2.0),
            vec![typed_bid("x", "1", 1.00, "EUR")],
        );

        BidValidationTask::new(empty, true)
            .run0(&context)
            .await
            .unwrap();

        let candidates = context.candidates.lock();
        assert_eq!(candidates.len(), 1);
        // retained in EUR, flagged, multiplier still applied
        assert_eq!(candidates[0].currency, "EUR");
        assert_eq!(candidates[0].adjusted_price, 2.0);
        assert!(!context.validation_errors.lock().is_empty());
    }
}
