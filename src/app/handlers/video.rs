use crate::app::handlers::{AppState, client_ip, run_auction, user_agent};
use crate::app::pipeline::auction::AuctionContext;
use crate::core::spec::openrtb::{BidRequest, Device, Imp, Site, Video};
use crate::core::vast;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

/// Video endpoints always answer 200 with a VAST document; failures
/// ride inside the document per IAB convention. CORS is deliberately
/// `*` since video players embed these cross-origin.
fn vast_response(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/xml")
        .insert_header(("access-control-allow-origin", "*"))
        .body(body)
}

#[derive(Debug, Deserialize)]
pub struct VastQuery {
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub tagid: String,
    #[serde(default)]
    pub w: u32,
    #[serde(default)]
    pub h: u32,
    #[serde(default)]
    pub mindur: i32,
    #[serde(default)]
    pub maxdur: i32,
    #[serde(default)]
    pub placement: i32,
    #[serde(default)]
    pub plcmt: i32,
    /// Comma separated VAST protocol ids
    #[serde(default)]
    pub protocols: String,
    /// Comma separated mime types
    #[serde(default)]
    pub mimes: String,
    #[serde(default)]
    pub floor: f64,
    #[serde(default)]
    pub tmax: u64,
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl VastQuery {
    fn to_bid_request(&self, ip: String, ua: String) -> BidRequest {
        let mimes = if self.mimes.is_empty() {
            vec!["video/mp4".to_string()]
        } else {
            split_csv(&self.mimes)
        };

        let protocols: Vec<i32> = split_csv(&self.protocols)
            .iter()
            .filter_map(|p| p.parse().ok())
            .collect();

        BidRequest {
            id: Uuid::new_v4().to_string(),
            imp: vec![Imp {
                id: "1".to_string(),
                video: Some(Video {
                    mimes,
                    minduration: self.mindur,
                    maxduration: self.maxdur,
                    protocols,
                    w: self.w,
                    h: self.h,
                    placement: self.placement,
                    plcmt: self.plcmt,
                }),
                tagid: self.tagid.clone(),
                bidfloor: self.floor,
                ..Default::default()
            }],
            site: Some(Site {
                domain: self.domain.clone(),
                ..Default::default()
            }),
            device: Some(Device {
                ip,
                ua,
                ..Default::default()
            }),
            tmax: self.tmax,
            at: 2,
            ..Default::default()
        }
    }
}

async fn run_video_auction(
    state: &AppState,
    source: String,
    account: String,
    req: BidRequest,
) -> HttpResponse {
    let context = AuctionContext::new(source, account, req);

    run_auction(state, &context).await;

    if let Some(reject) = context.reject.get() {
        return vast_response(vast::error_document(&format!("{:?}", reject)));
    }

    let winner = context
        .winners
        .get()
        .and_then(|winners| winners.first())
        .and_then(|winner| vast::for_winner(&winner.bid));

    match winner {
        Some(doc) => vast_response(doc),
        None => vast_response(vast::error_document("no eligible video bid")),
    }
}

/// GET /video/vast: query-parameterized video auction, VAST out.
pub async fn vast_get(
    state: web::Data<AppState>,
    query: web::Query<VastQuery>,
    http_req: HttpRequest,
) -> HttpResponse {
    if state.over_rate_limit() {
        return vast_response(vast::error_document("rate limit exceeded"));
    }

    if query.account.is_empty() {
        return vast_response(vast::error_document("missing account parameter"));
    }

    let req = query.to_bid_request(client_ip(&http_req), user_agent(&http_req));
    let source = http_req
        .match_pattern()
        .unwrap_or_else(|| "/video/vast".to_string());

    run_video_auction(&state, source, query.account.clone(), req).await
}

/// POST /video/openrtb: full OpenRTB request with video imps, VAST out.
pub async fn vast_post(
    state: web::Data<AppState>,
    body: web::Bytes,
    http_req: HttpRequest,
) -> HttpResponse {
    if state.over_rate_limit() {
        return vast_response(vast::error_document("rate limit exceeded"));
    }

    let req: BidRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return vast_response(vast::error_document(&format!("malformed request: {}", e)));
        }
    };

    if !req.imp.iter().any(|imp| imp.video.is_some()) {
        return vast_response(vast::error_document("no video impressions"));
    }

    let account = req
        .site
        .as_ref()
        .and_then(|s| s.publisher.as_ref())
        .or_else(|| req.app.as_ref().and_then(|a| a.publisher.as_ref()))
        .map(|p| p.id.clone())
        .unwrap_or_default();

    if account.is_empty() {
        return vast_response(vast::error_document("missing publisher id"));
    }

    let source = http_req
        .match_pattern()
        .unwrap_or_else(|| "/video/openrtb".to_string());

    run_video_auction(&state, source, account, req).await
}
