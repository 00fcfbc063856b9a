use crate::app::handlers::AppState;
use crate::core::usersync::{SyncRequest, build_syncs};
use actix_web::{HttpResponse, web};
use serde_json::json;
use std::sync::Arc;

/// POST /cookie_sync: returns the partner user-sync URLs for the
/// requested bidders with privacy macros resolved.
pub async fn cookie_sync(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let sync_req: SyncRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return HttpResponse::BadRequest()
                .json(json!({"error": format!("malformed sync request: {}", e)}));
        }
    };

    let partners: Vec<_> = state
        .adapters
        .all()
        .iter()
        .map(|adapter| Arc::new(adapter.partner().clone()))
        .collect();

    HttpResponse::Ok().json(build_syncs(&partners, &sync_req))
}
