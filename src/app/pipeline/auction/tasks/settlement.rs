use crate::app::pipeline::auction::AuctionContext;
use crate::child_span_info;
use crate::core::auction::{clearing, floors, targeting};
use crate::core::models::auction::{TypedBid, Winner};
use crate::core::pipeline::AsyncTask;
use crate::core::spec::nobidreasons;
use crate::core::spec::openrtb::{Bid, BidResponse, SeatBid};
use crate::core::spec::response_state::BidResponseState;
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use tracing::{Instrument, Span, debug};

/// Second-price clearing over the surviving bids, targeting-key
/// emission, and final response assembly. Exactly one winner per
/// impression; everything is denominated in the exchange default
/// currency by the time it gets here.
pub struct SettlementTask {
    default_currency: String,
}

impl SettlementTask {
    pub fn new(default_currency: String) -> Self {
        Self { default_currency }
    }

    fn build_response(&self, context: &AuctionContext, winners: &[Winner]) -> BidResponse {
        let mut seats: BTreeMap<String, Vec<Bid>> = BTreeMap::new();

        for winner in winners {
            let bid = &winner.bid;

            seats.entry(bid.partner.clone()).or_default().push(Bid {
                id: format!("{}-{}", bid.partner, bid.imp_id),
                impid: bid.imp_id.clone(),
                price: bid.adjusted_price,
                adm: bid.adm.clone(),
                nurl: bid.nurl.clone(),
                crid: bid.creative_id.clone(),
                adomain: bid.adomain.clone(),
                dealid: bid.deal_id.clone(),
                w: bid.w,
                h: bid.h,
                ext: Some(json!({
                    "targeting": winner.targeting,
                    "clear_price": winner.clear_price,
                    "media_type": bid.media_type,
                    "orig_price": bid.price,
                    "orig_currency": bid.currency,
                })),
            });
        }

        BidResponse {
            id: context.original_auction_id.clone(),
            seatbid: seats
                .into_iter()
                .map(|(seat, bid)| SeatBid { bid, seat })
                .collect(),
            cur: self.default_currency.clone(),
            nbr: None,
        }
    }

    async fn no_bid_state(&self, context: &AuctionContext) -> BidResponseState {
        let (nbr, desc) = if context.all_timed_out().await {
            (nobidreasons::ALL_TIMED_OUT, "All partners timed out")
        } else {
            (nobidreasons::NO_BIDS_RECEIVED, "No bids received")
        };

        BidResponseState::NoBidReason {
            reqid: context.original_auction_id.clone(),
            nbr,
            desc: Some(desc.to_string()),
        }
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = Span::current();

        let candidates: Vec<TypedBid> = std::mem::take(&mut *context.candidates.lock());

        if candidates.is_empty() {
            let state = self.no_bid_state(context).await;

            context
                .res
                .set(state)
                .map_err(|_| anyhow!("Response state already assigned at settlement"))?;

            span.record("winners", 0);
            debug!("Assigned no bid response to context");
            return Ok(());
        }

        let publisher = context
            .publisher
            .get()
            .ok_or_else(|| anyhow!("No publisher on context at settlement"))?;
        let imp_floors = context.floors.get().cloned().unwrap_or_default();

        let dsa = context
            .req
            .read()
            .regs
            .as_ref()
            .map(|r| r.dsa_required())
            .unwrap_or(false);

        let mut by_imp: HashMap<String, Vec<TypedBid>> = HashMap::new();
        for bid in candidates {
            by_imp.entry(bid.imp_id.clone()).or_default().push(bid);
        }

        let mut winners = Vec::with_capacity(by_imp.len());

        for (imp_id, mut group) in by_imp {
            clearing::sort_bids_by_adjusted_price(&mut group);

            // clear against the floor the *winning* partner was held to
            let winner_floor = floors::effective_floor(
                imp_floors.get(&imp_id).copied().unwrap_or(0.0),
                publisher.floor_adjustment(&group[0].partner),
            );

            let Some(settlement) = clearing::settle_imp(group, winner_floor) else {
                continue;
            };

            winners.push(Winner {
                targeting: targeting::keys_for_winner(&settlement.winner, dsa),
                clear_price: settlement.clear_price,
                bid: settlement.winner,
            });
        }

        winners.sort_by(|a, b| a.bid.imp_id.cmp(&b.bid.imp_id));

        span.record("winners", winners.len());

        let response = self.build_response(context, &winners);

        context
            .winners
            .set(winners)
            .map_err(|_| anyhow!("Winners already assigned at settlement"))?;

        context
            .res
            .set(BidResponseState::Bid(response))
            .map_err(|_| anyhow!("Response state already assigned at settlement"))?;

        debug!("Assigned valid bid response to context");
        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for SettlementTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("settlement_task", winners = tracing::field::Empty);

        self.run0(context).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::auction::MediaType;
    use crate::core::models::publisher::{Publisher, PublisherStatus};
    use crate::core::spec::openrtb::BidRequest;
    use std::sync::Arc;

    fn candidate(partner: &str, imp: &str, adjusted: f64) -> TypedBid {
        TypedBid {
            partner: partner.to_string(),
            imp_id: imp.to_string(),
            price: adjusted,
            currency: "USD".to_string(),
            converted_price: adjusted,
            adjusted_price: adjusted,
            media_type: MediaType::Banner,
            creative_id: format!("c-{}", partner),
            adm: "<div/>".to_string(),
            adomain: vec!["adv.com".to_string()],
            w: 300,
            h: 250,
            ..Default::default()
        }
    }

    fn context_with_candidates(bids: Vec<TypedBid>) -> AuctionContext {
        let context = AuctionContext::new(
            "/openrtb2/auction".to_string(),
            "p-A".to_string(),
            BidRequest {
                id: "r-1".to_string(),
                ..Default::default()
            },
        );

        context
            .publisher
            .set(Arc::new(
                Publisher {
                    id: "p-A".to_string(),
                    status: PublisherStatus::Active,
                    bid_multiplier: 1.0,
                    ..Default::default()
                }
                .normalized(),
            ))
            .ok()
            .unwrap();

        *context.candidates.lock() = bids;
        context
    }

    #[tokio::test]
    async fn test_second_price_settlement_and_response() {
        let context = context_with_candidates(vec![
            candidate("x", "1", 4.00),
            candidate("y", "1", 3.25),
        ]);

        SettlementTask::new("USD".to_string())
            .run0(&context)
            .await
            .unwrap();

        let winners = context.winners.get().unwrap();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].bid.partner, "x");
        assert_eq!(winners[0].clear_price, 3.26);
        assert_eq!(winners[0].targeting.get("hb_pb_x").unwrap(), "4.00");
        assert_eq!(winners[0].targeting.get("hb_partner").unwrap(), "x");

        let Some(BidResponseState::Bid(response)) = context.res.get() else {
            panic!("expected bid response");
        };

        assert_eq!(response.id, "r-1");
        assert_eq!(response.cur, "USD");
        assert_eq!(response.seatbid.len(), 1);
        assert_eq!(response.seatbid[0].seat, "x");
        assert_eq!(response.seatbid[0].bid[0].price, 4.00);
    }

    #[tokio::test]
    async fn test_one_winner_per_imp() {
        let context = context_with_candidates(vec![
            candidate("x", "1", 4.00),
            candidate("y", "1", 3.00),
            candidate("y", "2", 2.10),
        ]);

        SettlementTask::new("USD".to_string())
            .run0(&context)
            .await
            .unwrap();

        let winners = context.winners.get().unwrap();
        assert_eq!(winners.len(), 2);
        assert_eq!(winners[0].bid.imp_id, "1");
        assert_eq!(winners[1].bid.imp_id, "2");
        // single bid on imp 2 clears at floor + increment
        assert_eq!(winners[1].clear_price, 0.01);
    }

    #[tokio::test]
    async fn test_no_candidates_is_no_bid_200() {
        let context = context_with_candidates(Vec::new());

        SettlementTask::new("USD".to_string())
            .run0(&context)
            .await
            .unwrap();

        assert!(matches!(
            context.res.get(),
            Some(BidResponseState::NoBidReason {
                nbr: nobidreasons::NO_BIDS_RECEIVED,
                ..
            })
        ));
        assert!(context.reject.get().is_none());
    }
}
