use crate::app::handlers::{AppState, rate_limited_response, reject_response, run_auction};
use crate::app::pipeline::auction::AuctionContext;
use crate::core::spec::openrtb::BidRequest;
use crate::core::spec::response_state::{BidResponseState, JsonBidResponseState};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde_json::json;

fn account_id(req: &BidRequest) -> Option<String> {
    let from_site = req
        .site
        .as_ref()
        .and_then(|s| s.publisher.as_ref())
        .map(|p| p.id.clone());

    let from_app = req
        .app
        .as_ref()
        .and_then(|a| a.publisher.as_ref())
        .map(|p| p.id.clone());

    from_site.or(from_app).filter(|id| !id.is_empty())
}

/// POST /openrtb2/auction. OpenRTB 2.5 in, OpenRTB out. 200 with an
/// `nbr` body on any auction that ran, even bidless; non-200 only for
/// malformed requests and permission failures.
pub async fn auction(
    state: web::Data<AppState>,
    body: web::Bytes,
    http_req: HttpRequest,
) -> HttpResponse {
    if state.over_rate_limit() {
        return rate_limited_response();
    }

    let req: BidRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return HttpResponse::BadRequest()
                .json(json!({"error": format!("malformed bid request: {}", e)}));
        }
    };

    let Some(account) = account_id(&req) else {
        return HttpResponse::Unauthorized()
            .json(json!({"error": "missing site.publisher.id or app.publisher.id"}));
    };

    let source = http_req
        .match_pattern()
        .unwrap_or_else(|| "/openrtb2/auction".to_string());

    let context = AuctionContext::new(source, account, req);

    run_auction(&state, &context).await;

    if let Some(reject) = context.reject.get() {
        return reject_response(reject);
    }

    let state_out = context
        .res
        .get()
        .cloned()
        .unwrap_or(BidResponseState::NoBid {
            desc: Some("Failed processing req".to_string()),
        });

    JsonBidResponseState(state_out).respond_to(&http_req)
}
