use crate::app::config::AuctionConfig;
use crate::app::pipeline::auction::AuctionContext;
use crate::app::pipeline::auction::context::RequestReject;
use crate::core::pipeline::BlockingTask;
use crate::core::spec::nobidreasons;
use crate::core::spec::response_state::BidResponseState;
use crate::child_span_info;
use anyhow::anyhow;
use std::time::Duration;
use tracing::debug;

/// Request sanity plus deadline derivation. Everything rejected here is
/// the caller's 400; the auction never starts.
pub struct ValidateRequestTask {
    cfg: AuctionConfig,
    default_currency: String,
}

impl ValidateRequestTask {
    pub fn new(cfg: AuctionConfig, default_currency: String) -> Self {
        Self {
            cfg,
            default_currency,
        }
    }

    fn fail(
        &self,
        context: &AuctionContext,
        message: &str,
    ) -> Result<(), anyhow::Error> {
        let brs = BidResponseState::NoBidReason {
            reqid: context.original_auction_id.clone(),
            nbr: nobidreasons::openrtb::INVALID_REQUEST,
            desc: Some(message.to_string()),
        };

        context
            .res
            .set(brs)
            .map_err(|_| anyhow!("Response state already assigned during validation"))?;

        context
            .reject
            .set(RequestReject::BadRequest(message.to_string()))
            .map_err(|_| anyhow!("Reject already assigned during validation"))?;

        Err(anyhow!("Invalid request: {}", message))
    }

    /// All partner invocations share one deadline derived from the
    /// lower of the client tmax and the internal cap, minus a safety
    /// margin. No partner gets a larger slice than any other.
    fn assign_deadline(&self, context: &AuctionContext, req_tmax: u64) {
        let publisher_default = context
            .publisher
            .get()
            .map(|p| p.default_tmax_ms)
            .unwrap_or(0);

        let requested = if req_tmax > 0 {
            req_tmax
        } else if publisher_default > 0 {
            publisher_default
        } else {
            self.cfg.tmax_default_ms
        };

        let effective = requested.min(self.cfg.tmax_cap_ms);
        let budget = Duration::from_millis(
            effective
                .saturating_sub(self.cfg.deadline_margin_ms)
                .max(10),
        );

        let remaining = budget.saturating_sub(context.started_at.elapsed());

        let _ = context.budget.set(budget);
        let _ = context
            .deadline
            .set(tokio::time::Instant::now() + remaining);
    }
}

impl BlockingTask<AuctionContext, anyhow::Error> for ValidateRequestTask {
    fn run(&self, context: &AuctionContext) -> Result<(), anyhow::Error> {
        let span = child_span_info!(
            "request_validate_task",
            invalid_reason = tracing::field::Empty
        )
        .entered();

        debug!(
            "Validating request for account {} source {}",
            context.account_id, context.source
        );

        let (req_tmax, failure) = {
            let mut req = context.req.write();

            let failure = if req.id.is_empty() {
                Some("Missing request id")
            } else if req.imp.is_empty() {
                Some("No impressions")
            } else if !req.has_inventory() {
                Some("Missing site or app object")
            } else if req.site.is_some() && req.app.is_some() {
                Some("Both site and app present")
            } else if req.imp.iter().any(|imp| !imp.has_media_type()) {
                Some("Impression without any media type")
            } else if req.imp.iter().any(|imp| imp.id.is_empty()) {
                Some("Impression without an id")
            } else {
                None
            };

            if failure.is_none() && req.cur.is_empty() {
                req.cur = vec![self.default_currency.clone()];
            }

            (req.tmax, failure)
        };

        if let Some(message) = failure {
            span.record("invalid_reason", message);
            return self.fail(context, message);
        }

        self.assign_deadline(context, req_tmax);

        span.record("invalid_reason", "none");
        debug!("Request passed validation");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spec::openrtb::{Banner, BidRequest, Imp, Site};

    fn task() -> ValidateRequestTask {
        ValidateRequestTask::new(AuctionConfig::default(), "USD".to_string())
    }

    fn valid_request() -> BidRequest {
        BidRequest {
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
            tmax: 1000,
            ..Default::default()
        }
    }

    fn ctx(req: BidRequest) -> AuctionContext {
        AuctionContext::new("/openrtb2/auction".to_string(), "p-A".to_string(), req)
    }

    #[test]
    fn test_valid_request_gets_deadline_and_currency() {
        let context = ctx(valid_request());

        task().run(&context).unwrap();

        assert!(context.reject.get().is_none());
        assert_eq!(context.req.read().cur, vec!["USD".to_string()]);

        // 1000ms tmax minus 50ms margin
        assert_eq!(
            context.budget.get().copied().unwrap(),
            Duration::from_millis(950)
        );
    }

    #[test]
    fn test_tmax_capped_at_internal_ceiling() {
        let mut req = valid_request();
        req.tmax = 60_000;
        let context = ctx(req);

        task().run(&context).unwrap();

        assert_eq!(
            context.budget.get().copied().unwrap(),
            Duration::from_millis(2450)
        );
    }

    #[test]
    fn test_missing_imps_rejected() {
        let mut req = valid_request();
        req.imp.clear();
        let context = ctx(req);

        assert!(task().run(&context).is_err());
        assert!(matches!(
            context.reject.get(),
            Some(RequestReject::BadRequest(_))
        ));
    }

    #[test]
    fn test_imp_without_media_type_rejected() {
        let mut req = valid_request();
        req.imp[0].banner = None;
        let context = ctx(req);

        assert!(task().run(&context).is_err());
    }

    #[test]
    fn test_missing_inventory_rejected() {
        let mut req = valid_request();
        req.site = None;
        let context = ctx(req);

        assert!(task().run(&context).is_err());
    }
}
