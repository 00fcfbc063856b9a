use crate::core::adapters::PartnerAdapter;
use crate::core::breaker::CircuitBreaker;
use crate::core::models::auction::{
    ExclusionReason, PartnerOutcome, RejectedBid, TypedBid, Winner,
};
use crate::core::models::partner::Partner;
use crate::core::models::publisher::Publisher;
use crate::core::observability::metrics;
use crate::core::privacy::PrivacyPosture;
use crate::core::spec::openrtb::BidRequest;
use crate::core::spec::response_state::BidResponseState;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Pre-auction failures that surface as non-200s. Everything that
/// happens after partner selection is a 200 regardless of outcome.
#[derive(Debug, Clone)]
pub enum RequestReject {
    BadRequest(String),
    UnknownPublisher,
    PublisherSuspended,
    UnauthorizedDomain,
    Internal(String),
}

/// One selected partner's dispatch state. The request is this
/// partner's private rewritten copy: params attached, privacy
/// obligations applied. Nothing here is shared across partners.
pub struct PartnerContext {
    pub partner: Arc<Partner>,
    pub adapter: Arc<dyn PartnerAdapter>,
    pub circuit: Arc<CircuitBreaker>,
    pub req: BidRequest,
    pub outcome: OnceLock<PartnerOutcome>,
    pub bids: OnceLock<Vec<TypedBid>>,
}

/// Top level auction context carrying all state for one request
/// pipeline run.
///
/// # Arguments
/// * `req` - The inbound [`BidRequest`], interior-mutable for
///   normalization during validation
/// * `res` - The final outbound [`BidResponseState`] assigned exactly
///   once by whichever task terminates the auction
/// * `partners` - Selected partner contexts assigned by the matching
///   stage and consumed by callouts and bid validation
pub struct AuctionContext {
    /// Route pattern that accepted the request
    pub source: String,
    pub account_id: String,
    pub original_auction_id: String,
    pub started_at: std::time::Instant,
    pub req: RwLock<BidRequest>,
    pub res: OnceLock<BidResponseState>,
    pub reject: OnceLock<RequestReject>,
    /// Shared partner deadline, set during validation
    pub deadline: OnceLock<tokio::time::Instant>,
    pub budget: OnceLock<Duration>,
    pub publisher: OnceLock<Arc<Publisher>>,
    pub posture: OnceLock<PrivacyPosture>,
    pub partners: tokio::sync::Mutex<Vec<PartnerContext>>,
    pub exclusions: Mutex<Vec<(String, ExclusionReason)>>,
    /// Converted per-imp floors in the default currency
    pub floors: OnceLock<HashMap<String, f64>>,
    /// Bids that survived validation, awaiting clearing
    pub candidates: Mutex<Vec<TypedBid>>,
    pub rejected_bids: Mutex<Vec<RejectedBid>>,
    pub winners: OnceLock<Vec<Winner>>,
    pub validation_errors: Mutex<Vec<String>>,
    /// imp id -> client divId for the simplified intake, empty otherwise
    pub slot_map: HashMap<String, String>,
}

impl AuctionContext {
    pub fn new(source: String, account_id: String, req: BidRequest) -> AuctionContext {
        AuctionContext::with_slot_map(source, account_id, req, HashMap::new())
    }

    pub fn with_slot_map(
        source: String,
        account_id: String,
        req: BidRequest,
        slot_map: HashMap<String, String>,
    ) -> AuctionContext {
        AuctionContext {
            source,
            account_id,
            original_auction_id: req.id.clone(),
            started_at: std::time::Instant::now(),
            req: RwLock::new(req),
            res: OnceLock::new(),
            reject: OnceLock::new(),
            deadline: OnceLock::new(),
            budget: OnceLock::new(),
            publisher: OnceLock::new(),
            posture: OnceLock::new(),
            partners: tokio::sync::Mutex::new(Vec::new()),
            exclusions: Mutex::new(Vec::new()),
            floors: OnceLock::new(),
            candidates: Mutex::new(Vec::new()),
            rejected_bids: Mutex::new(Vec::new()),
            winners: OnceLock::new(),
            validation_errors: Mutex::new(Vec::new()),
            slot_map,
        }
    }

    /// Records a selection-time exclusion for analytics and metrics.
    pub fn exclude(&self, partner: &str, reason: ExclusionReason) {
        metrics::PARTNER_EXCLUSIONS
            .with_label_values(&[partner, &reason.to_string()])
            .inc();

        self.exclusions.lock().push((partner.to_string(), reason));
    }

    pub fn duration_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// True when partners were dispatched and every one of them hit
    /// the deadline.
    pub async fn all_timed_out(&self) -> bool {
        let partners = self.partners.lock().await;

        !partners.is_empty()
            && partners.iter().all(|p| {
                p.outcome.get().map(|o| o.timed_out).unwrap_or(false)
            })
    }
}
