use crate::app::handlers::{
    AppState, client_ip, rate_limited_response, reject_response, run_auction, user_agent,
};
use crate::app::pipeline::auction::AuctionContext;
use crate::core::validation::slots::{SlotBid, SlotsRequest, SlotsResponse, build_bid_request};
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use tracing::debug;

/// POST /v1/bid. The simplified publisher intake: named page slots in,
/// per-divId bids out. Internally this is a normal OpenRTB auction;
/// the slot map built at intake translates winners back.
pub async fn bid(
    state: web::Data<AppState>,
    body: web::Bytes,
    http_req: HttpRequest,
) -> HttpResponse {
    if state.over_rate_limit() {
        return rate_limited_response();
    }

    let slots_req: SlotsRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return HttpResponse::BadRequest()
                .json(json!({"error": format!("malformed slots request: {}", e)}));
        }
    };

    if slots_req.account_id.is_empty() {
        return HttpResponse::Unauthorized().json(json!({"error": "missing accountId"}));
    }

    let intake = build_bid_request(&slots_req, &client_ip(&http_req), &user_agent(&http_req));

    for warning in &intake.warnings {
        debug!("Slot intake: {}", warning);
    }

    if intake.request.imp.is_empty() {
        return HttpResponse::BadRequest().json(json!({"error": "no slots with usable sizes"}));
    }

    let source = http_req
        .match_pattern()
        .unwrap_or_else(|| "/v1/bid".to_string());

    let context = AuctionContext::with_slot_map(
        source,
        slots_req.account_id.clone(),
        intake.request,
        intake.slot_map,
    );

    run_auction(&state, &context).await;

    if let Some(reject) = context.reject.get() {
        return reject_response(reject);
    }

    let bids: Vec<SlotBid> = context
        .winners
        .get()
        .map(|winners| {
            winners
                .iter()
                .filter_map(|winner| {
                    let div_id = context.slot_map.get(&winner.bid.imp_id)?.clone();

                    Some(SlotBid {
                        div_id,
                        partner: winner.bid.partner.clone(),
                        price: winner.bid.adjusted_price,
                        clear_price: winner.clear_price,
                        width: winner.bid.w,
                        height: winner.bid.h,
                        ad: winner.bid.adm.clone(),
                        targeting: winner.targeting.clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    HttpResponse::Ok().json(SlotsResponse {
        bids,
        response_time: context.duration_ms(),
    })
}
