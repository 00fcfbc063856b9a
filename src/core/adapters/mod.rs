//! Adapter framework. Every demand partner is a value implementing
//! [`PartnerAdapter`]: it rewrites the normalized auction request into
//! the partner's wire shape and decodes the partner's raw bytes back
//! into typed bids. Adapters never own transport.

pub mod ortb;
pub mod registry;

use crate::core::demand::encoding::Header;
use crate::core::models::auction::TypedBid;
use crate::core::models::partner::Partner;
use crate::core::spec::openrtb::BidRequest;
use bytes::Bytes;
use std::fmt;

/// One HTTP call an adapter wants made. Bodies are fully encoded
/// (including compression) before they leave the adapter.
pub struct OutboundCall {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
    /// Which impressions this call covers, for diagnostics
    pub imp_ids: Vec<String>,
}

/// Raw transport result handed back to the adapter for decoding.
pub struct RawResponse {
    pub status: u32,
    pub body: Bytes,
}

/// A per-impression (or per-call) rejection produced inside an adapter.
/// These never abort the other impressions of the same request.
#[derive(Debug, Clone)]
pub struct AdapterError {
    pub imp_id: Option<String>,
    pub message: String,
}

impl AdapterError {
    pub fn for_imp(imp_id: impl Into<String>, message: impl Into<String>) -> Self {
        AdapterError {
            imp_id: Some(imp_id.into()),
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        AdapterError {
            imp_id: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.imp_id {
            Some(imp) => write!(f, "imp {}: {}", imp, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Decoded bids plus the currency the partner quoted them in.
#[derive(Default)]
pub struct PartnerBids {
    pub bids: Vec<TypedBid>,
    pub currency: String,
}

pub trait PartnerAdapter: Send + Sync {
    /// Static descriptor: code, endpoint, capabilities, GVL id.
    fn partner(&self) -> &Partner;

    /// Produce zero or more HTTP calls for this auction. Zero calls
    /// with errors means the partner had nothing it could buy.
    fn make_requests(&self, req: &BidRequest) -> (Vec<OutboundCall>, Vec<AdapterError>);

    /// Decode raw partner bytes into typed bids.
    fn make_bids(&self, req: &BidRequest, raw: &RawResponse) -> (PartnerBids, Vec<AdapterError>);
}
