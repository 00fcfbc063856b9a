mod bid_validation;
mod partner_callouts;
mod partner_matching;
mod privacy_gate;
mod publisher_lookup;
mod record_analytics;
mod settlement;
mod validate;

pub use bid_validation::BidValidationTask;
pub use partner_callouts::PartnerCalloutsTask;
pub use partner_matching::PartnerMatchingTask;
pub use privacy_gate::PrivacyGateTask;
pub use publisher_lookup::PublisherLookupTask;
pub use record_analytics::RecordAnalyticsTask;
pub use settlement::SettlementTask;
pub use validate::ValidateRequestTask;
