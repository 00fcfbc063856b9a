use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, EnumString, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaType {
    #[default]
    Banner,
    Video,
    Native,
    Audio,
}

/// Why a configured partner was not dispatched for an auction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExclusionReason {
    CircuitBreakerOpen,
    NoConsent,
    NoSlotParams,
    ChannelUnsupported,
    MediaTypeUnsupported,
    AdapterMissing,
}

/// Why a returned bid was dropped before clearing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BidRejectReason {
    BelowFloor,
    CurrencyUnconvertible,
    MissingAdomain,
    EmptyCreative,
    UnknownImp,
}

/// One partner bid after decode and normalization. Prices move through
/// three stages: `price` as returned, `converted_price` in the exchange
/// default currency, `adjusted_price` after the publisher multiplier.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TypedBid {
    pub partner: String,
    pub imp_id: String,
    pub price: f64,
    pub currency: String,
    pub converted_price: f64,
    pub adjusted_price: f64,
    pub media_type: MediaType,
    pub creative_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub adm: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub nurl: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub deal_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub adomain: Vec<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub w: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub h: u32,
}

/// The winning bid for one impression plus its clearing outcome.
/// Targeting keys use a BTreeMap so emission order is stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Winner {
    pub bid: TypedBid,
    pub clear_price: f64,
    pub targeting: BTreeMap<String, String>,
}

/// Per-partner dispatch outcome, recorded whether or not the partner
/// returned bids.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PartnerOutcome {
    pub partner: String,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u32>,
    pub bid_count: u32,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// A rejected bid as recorded for analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedBid {
    pub partner: String,
    pub imp_id: String,
    pub price: f64,
    pub reason: BidRejectReason,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}
