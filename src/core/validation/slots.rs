//! Simplified publisher intake: a list of page slots is translated into
//! an OpenRTB request, and the imp-id -> divId mapping built here is
//! used on the way out to hand winners back under the publisher's own
//! slot identifiers.

use crate::core::spec::openrtb::{Banner, BidRequest, Device, Imp, Site};
use crate::core::validation::sizes::normalize_sizes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotsRequest {
    pub account_id: String,
    #[serde(default)]
    pub slots: Vec<SlotDef>,
    /// Advisory client deadline; the exchange cap still applies
    #[serde(default)]
    pub tmax: u64,
    #[serde(default)]
    pub site: Option<SlotsSite>,
    #[serde(default)]
    pub currency: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotsSite {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub page: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDef {
    pub div_id: String,
    pub sizes: Value,
    #[serde(default)]
    pub ad_unit_path: String,
    #[serde(default)]
    pub floor: f64,
}

/// Maps generated imp ids back to the client-facing divIds.
pub type SlotMap = HashMap<String, String>;

pub struct SlotIntake {
    pub request: BidRequest,
    pub slot_map: SlotMap,
    pub warnings: Vec<String>,
}

/// Builds the internal auction request. Slots whose sizes normalize to
/// nothing are dropped with a warning; an intake with zero surviving
/// slots is the caller's 400.
pub fn build_bid_request(slots_req: &SlotsRequest, client_ip: &str, ua: &str) -> SlotIntake {
    let mut imps = Vec::with_capacity(slots_req.slots.len());
    let mut slot_map = SlotMap::new();
    let mut warnings = Vec::new();

    for (idx, slot) in slots_req.slots.iter().enumerate() {
        let formats = normalize_sizes(&slot.sizes);

        if formats.is_empty() {
            warnings.push(format!("Slot {} has no usable sizes, dropped", slot.div_id));
            continue;
        }

        let imp_id = format!("{}", idx + 1);
        slot_map.insert(imp_id.clone(), slot.div_id.clone());

        imps.push(Imp {
            id: imp_id,
            banner: Some(Banner {
                format: formats,
                ..Default::default()
            }),
            tagid: slot.ad_unit_path.clone(),
            bidfloor: slot.floor,
            ..Default::default()
        });
    }

    let site = slots_req.site.as_ref().map(|s| Site {
        domain: s.domain.clone(),
        page: s.page.clone(),
        ..Default::default()
    });

    let request = BidRequest {
        id: Uuid::new_v4().to_string(),
        imp: imps,
        site,
        device: Some(Device {
            ip: client_ip.to_string(),
            ua: ua.to_string(),
            ..Default::default()
        }),
        tmax: slots_req.tmax,
        cur: slots_req.currency.clone(),
        at: 2,
        ..Default::default()
    };

    SlotIntake {
        request,
        slot_map,
        warnings,
    }
}

/// One bid in the simplified response shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotBid {
    pub div_id: String,
    pub partner: String,
    pub price: f64,
    pub clear_price: f64,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ad: String,
    pub targeting: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotsResponse {
    pub bids: Vec<SlotBid>,
    pub response_time: u64,
}
