//! The standard OpenRTB-JSON adapter. Most partners speak plain
//! OpenRTB with their slot parameters tucked under `imp.ext.bidder`;
//! this adapter covers them all, parameterized by the partner
//! descriptor. Partners with a bespoke wire format get their own
//! [`PartnerAdapter`] impl instead.

use crate::core::adapters::{
    AdapterError, OutboundCall, PartnerAdapter, PartnerBids, RawResponse,
};
use crate::core::demand::encoding::{RequestEncoder, ResponseDecoder};
use crate::core::models::auction::{MediaType, TypedBid};
use crate::core::models::partner::Partner;
use crate::core::spec::openrtb::{Bid, BidRequest, Imp};
use ahash::AHashMap;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

pub struct OrtbAdapter {
    partner: Arc<Partner>,
}

impl OrtbAdapter {
    pub fn new(partner: Arc<Partner>) -> Self {
        OrtbAdapter { partner }
    }

    /// Drops media objects the partner cannot buy. An imp left with no
    /// media type is omitted entirely.
    fn gate_media(&self, imp: &Imp) -> Option<Imp> {
        let caps = &self.partner.capabilities;
        let mut imp = imp.clone();

        if !caps.banner {
            imp.banner = None;
        }
        if !caps.video {
            imp.video = None;
        }
        if !caps.native {
            imp.native = None;
        }
        if !caps.audio {
            imp.audio = None;
        }

        imp.has_media_type().then_some(imp)
    }

    /// Moves this partner's parameter blob from `imp.ext[code]` to the
    /// conventional `imp.ext.bidder` slot, dropping every other
    /// partner's blob on the floor.
    fn extract_params(&self, imp: &mut Imp) -> Option<Value> {
        let params = imp.ext.as_ref()?.get(self.partner.code.as_str())?.clone();

        imp.ext = Some(json!({ "bidder": params.clone() }));
        Some(params)
    }

    /// Strips the exchange's internal site/app/publisher ids so the
    /// account identifier never leaks upstream, unless the partner's
    /// slot params carry replacement ids of their own.
    fn sanitize_ids(req: &mut BidRequest, params: Option<&Value>) {
        let override_id = |key: &str| -> Option<String> {
            params?
                .get(key)
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        };

        if let Some(site) = req.site.as_mut() {
            site.id = override_id("site_id").unwrap_or_default();

            if let Some(publisher) = site.publisher.as_mut() {
                publisher.id = override_id("publisher_id").unwrap_or_default();
            }
        }

        if let Some(app) = req.app.as_mut() {
            app.id = override_id("app_id").unwrap_or_default();

            if let Some(publisher) = app.publisher.as_mut() {
                publisher.id = override_id("publisher_id").unwrap_or_default();
            }
        }
    }

    fn encode_call(&self, req: &BidRequest) -> Result<OutboundCall, AdapterError> {
        let encoded = RequestEncoder::encode(req, self.partner.gzip)
            .map_err(|e| AdapterError::general(format!("Encode failed: {}", e)))?;

        Ok(OutboundCall {
            method: "POST",
            url: self.partner.endpoint.clone(),
            headers: encoded.headers,
            body: encoded.data,
            imp_ids: req.imp.iter().map(|i| i.id.clone()).collect(),
        })
    }

    /// Media type for one returned bid: the partner's explicit ext hint
    /// wins, otherwise the original impression decides.
    fn infer_media_type(bid: &Bid, imp: &Imp) -> MediaType {
        let hint = bid
            .ext
            .as_ref()
            .and_then(|ext| ext.get("mediatype"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<MediaType>().ok());

        if let Some(media_type) = hint {
            return media_type;
        }

        // unambiguous imp first, then markup sniff for mixed imps
        let declared = [
            (imp.banner.is_some(), MediaType::Banner),
            (imp.video.is_some(), MediaType::Video),
            (imp.native.is_some(), MediaType::Native),
            (imp.audio.is_some(), MediaType::Audio),
        ];

        let mut present = declared.iter().filter(|(has, _)| *has);
        let first = present.next().map(|(_, mt)| *mt).unwrap_or_default();

        if present.next().is_none() {
            return first;
        }

        if imp.video.is_some() && (bid.adm.contains("<VAST") || bid.adm.starts_with("<?xml")) {
            return MediaType::Video;
        }

        first
    }
}

impl PartnerAdapter for OrtbAdapter {
    fn partner(&self) -> &Partner {
        &self.partner
    }

    fn make_requests(&self, req: &BidRequest) -> (Vec<OutboundCall>, Vec<AdapterError>) {
        let caps = &self.partner.capabilities;
        let mut errors = Vec::new();

        if (req.site.is_some() && !caps.site) || (req.app.is_some() && !caps.app) {
            return (
                Vec::new(),
                vec![AdapterError::general("Channel not supported")],
            );
        }

        let mut outbound = req.clone();
        let mut imps = Vec::with_capacity(req.imp.len());
        let mut first_params = None;

        for imp in &req.imp {
            let Some(mut gated) = self.gate_media(imp) else {
                errors.push(AdapterError::for_imp(&imp.id, "Media type not supported"));
                continue;
            };

            match self.extract_params(&mut gated) {
                Some(params) => {
                    if first_params.is_none() {
                        first_params = Some(params);
                    }
                    imps.push(gated);
                }
                None => {
                    errors.push(AdapterError::for_imp(&imp.id, "No partner params on imp"));
                }
            }
        }

        if imps.is_empty() {
            errors.push(AdapterError::general("No impressions supported"));
            return (Vec::new(), errors);
        }

        Self::sanitize_ids(&mut outbound, first_params.as_ref());

        let mut calls = Vec::new();

        if self.partner.multi_imp {
            outbound.imp = imps;

            match self.encode_call(&outbound) {
                Ok(call) => calls.push(call),
                Err(e) => errors.push(e),
            }
        } else {
            // one call per impression, each with a unique request id
            for (idx, imp) in imps.into_iter().enumerate() {
                let mut single = outbound.clone();
                single.id = format!("{}-{}", outbound.id, idx + 1);
                single.imp = vec![imp];

                match self.encode_call(&single) {
                    Ok(call) => calls.push(call),
                    Err(e) => errors.push(e),
                }
            }
        }

        (calls, errors)
    }

    fn make_bids(&self, req: &BidRequest, raw: &RawResponse) -> (PartnerBids, Vec<AdapterError>) {
        if raw.status == 204 || raw.body.is_empty() {
            debug!("Partner {} returned no content", self.partner.code);
            return (PartnerBids::default(), Vec::new());
        }

        let response = match ResponseDecoder::decode(&raw.body) {
            Ok(response) => response,
            Err(e) => {
                return (
                    PartnerBids::default(),
                    vec![AdapterError::general(e.to_string())],
                );
            }
        };

        let currency = if response.cur.is_empty() {
            "USD".to_string()
        } else {
            response.cur.clone()
        };

        // built once, O(1) per bid
        let imps: AHashMap<&str, &Imp> =
            req.imp.iter().map(|imp| (imp.id.as_str(), imp)).collect();

        let mut bids = Vec::new();
        let mut errors = Vec::new();

        for seatbid in response.seatbid {
            for bid in seatbid.bid {
                let Some(imp) = imps.get(bid.impid.as_str()) else {
                    errors.push(AdapterError::general(format!(
                        "Bid references unknown imp {}",
                        bid.impid
                    )));
                    continue;
                };

                let media_type = Self::infer_media_type(&bid, imp);

                let (w, h) = if bid.w > 0 && bid.h > 0 {
                    (bid.w, bid.h)
                } else {
                    imp.banner
                        .as_ref()
                        .and_then(|b| b.format.first())
                        .map(|f| (f.w, f.h))
                        .unwrap_or((0, 0))
                };

                bids.push(TypedBid {
                    partner: self.partner.code.clone(),
                    imp_id: bid.impid,
                    price: bid.price,
                    currency: currency.clone(),
                    converted_price: 0.0,
                    adjusted_price: 0.0,
                    media_type,
                    creative_id: bid.crid,
                    adm: bid.adm,
                    nurl: bid.nurl,
                    deal_id: bid.dealid,
                    adomain: bid.adomain,
                    w,
                    h,
                });
            }
        }

        (PartnerBids { bids, currency }, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::partner::{Capabilities, PartnerBuilder};
    use crate::core::spec::openrtb::{
        Banner, BidResponse, Format, Publisher, SeatBid, Site, Video,
    };
    use bytes::Bytes;

    fn partner(code: &str) -> Partner {
        PartnerBuilder::default()
            .code(code.to_string())
            .name(code.to_uppercase())
            .endpoint(format!("https://bid.{}.test/rtb", code))
            .build()
            .unwrap()
    }

    fn request_with_params(code: &str) -> BidRequest {
        BidRequest {
            id: "auction-1".to_string(),
            imp: vec![Imp {
                id: "1".to_string(),
                banner: Some(Banner {
                    format: vec![Format { w: 300, h: 250 }],
                    ..Default::default()
                }),
                ext: Some(json!({ code: {"placement": 77}, "other": {"x": 1} })),
                ..Default::default()
            }],
            site: Some(Site {
                id: "internal-site-9".to_string(),
                domain: "example.com".to_string(),
                publisher: Some(Publisher {
                    id: "internal-pub-1".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn decode_body(call: &OutboundCall, gzip: bool) -> BidRequest {
        if gzip {
            use flate2::read::GzDecoder;
            use std::io::Read;

            let mut plain = Vec::new();
            GzDecoder::new(call.body.as_slice())
                .read_to_end(&mut plain)
                .unwrap();
            serde_json::from_slice(&plain).unwrap()
        } else {
            serde_json::from_slice(&call.body).unwrap()
        }
    }

    #[test]
    fn test_make_requests_sanitizes_ids_and_maps_params() {
        let adapter = OrtbAdapter::new(Arc::new(partner("x")));
        let (calls, errors) = adapter.make_requests(&request_with_params("x"));

        assert!(errors.is_empty());
        assert_eq!(calls.len(), 1);

        let sent = decode_body(&calls[0], true);
        let site = sent.site.as_ref().unwrap();

        // internal identifiers never leak upstream
        assert!(site.id.is_empty());
        assert!(site.publisher.as_ref().unwrap().id.is_empty());
        assert_eq!(site.domain, "example.com");

        let ext = sent.imp[0].ext.as_ref().unwrap();
        assert_eq!(ext["bidder"]["placement"], 77);
        assert!(ext.get("other").is_none());
        assert!(ext.get("x").is_none());
    }

    #[test]
    fn test_partner_site_id_override_survives() {
        let adapter = OrtbAdapter::new(Arc::new(partner("x")));

        let mut req = request_with_params("x");
        req.imp[0].ext = Some(json!({ "x": {"placement": 1, "site_id": "px-site-44"} }));

        let (calls, _) = adapter.make_requests(&req);
        let sent = decode_body(&calls[0], true);

        assert_eq!(sent.site.as_ref().unwrap().id, "px-site-44");
    }

    #[test]
    fn test_media_gating_drops_unsupported_imps() {
        let mut p = partner("x");
        p.capabilities = Capabilities {
            video: false,
            ..Default::default()
        };
        let adapter = OrtbAdapter::new(Arc::new(p));

        let mut req = request_with_params("x");
        req.imp[0].banner = None;
        req.imp[0].video = Some(Video::default());

        let (calls, errors) = adapter.make_requests(&req);

        assert!(calls.is_empty());
        assert!(errors.iter().any(|e| e.imp_id.as_deref() == Some("1")));
        assert!(errors.iter().any(|e| e.imp_id.is_none()));
    }

    #[test]
    fn test_missing_params_drops_imp() {
        let adapter = OrtbAdapter::new(Arc::new(partner("x")));
        let (calls, errors) = adapter.make_requests(&request_with_params("someone_else"));

        assert!(calls.is_empty());
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_single_imp_partner_gets_one_call_per_imp() {
        let mut p = partner("x");
        p.multi_imp = false;
        p.gzip = false;
        let adapter = OrtbAdapter::new(Arc::new(p));

        let mut req = request_with_params("x");
        let mut second = req.imp[0].clone();
        second.id = "2".to_string();
        req.imp.push(second);

        let (calls, errors) = adapter.make_requests(&req);

        assert!(errors.is_empty());
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].imp_ids, vec!["1".to_string()]);
        assert_eq!(calls[1].imp_ids, vec!["2".to_string()]);

        let first = decode_body(&calls[0], false);
        let second = decode_body(&calls[1], false);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_make_bids_decodes_and_infers_type() {
        let adapter = OrtbAdapter::new(Arc::new(partner("x")));
        let req = request_with_params("x");

        let response = BidResponse {
            id: "auction-1".to_string(),
            cur: "EUR".to_string(),
            seatbid: vec![SeatBid {
                bid: vec![Bid {
                    impid: "1".to_string(),
                    price: 2.0,
                    crid: "c1".to_string(),
                    adomain: vec!["adv.com".to_string()],
                    ..Default::default()
                }],
                seat: "x".to_string(),
            }],
            ..Default::default()
        };

        let raw = RawResponse {
            status: 200,
            body: Bytes::from(serde_json::to_vec(&response).unwrap()),
        };

        let (partner_bids, errors) = adapter.make_bids(&req, &raw);

        assert!(errors.is_empty());
        assert_eq!(partner_bids.currency, "EUR");
        assert_eq!(partner_bids.bids.len(), 1);

        let bid = &partner_bids.bids[0];
        assert_eq!(bid.partner, "x");
        assert_eq!(bid.media_type, MediaType::Banner);
        // size backfilled from the impression
        assert_eq!((bid.w, bid.h), (300, 250));
    }

    #[test]
    fn test_make_bids_rejects_unknown_imp() {
        let adapter = OrtbAdapter::new(Arc::new(partner("x")));
        let req = request_with_params("x");

        let response = BidResponse {
            seatbid: vec![SeatBid {
                bid: vec![Bid {
                    impid: "ghost".to_string(),
                    price: 1.0,
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };

        let raw = RawResponse {
            status: 200,
            body: Bytes::from(serde_json::to_vec(&response).unwrap()),
        };

        let (partner_bids, errors) = adapter.make_bids(&req, &raw);

        assert!(partner_bids.bids.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_empty_body_is_no_bids_not_error() {
        let adapter = OrtbAdapter::new(Arc::new(partner("x")));
        let req = request_with_params("x");

        let raw = RawResponse {
            status: 204,
            body: Bytes::new(),
        };

        let (partner_bids, errors) = adapter.make_bids(&req, &raw);
        assert!(partner_bids.bids.is_empty());
        assert!(errors.is_empty());
    }
}
