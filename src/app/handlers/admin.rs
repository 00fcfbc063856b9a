use crate::app::handlers::AppState;
use crate::core::observability::metrics;
use actix_web::{HttpResponse, web};
use log::warn;
use serde::Deserialize;
use serde_json::json;

/// GET /health: process liveness only.
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": "ok"}))
}

/// GET /health/ready: store reachable and the currency table loaded.
/// A stale-but-present rate table stays ready; staleness is reported,
/// not fatal.
pub async fn ready(state: web::Data<AppState>) -> HttpResponse {
    let store_ok = state.store.ping().await.is_ok();
    let currency = state.currency.stats();

    let ready = store_ok && currency.initialized;

    let body = json!({
        "status": if ready { "ready" } else { "not_ready" },
        "store": store_ok,
        "currency_initialized": currency.initialized,
        "currency_stale": currency.stale,
    });

    if ready {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// GET /metrics: Prometheus scrape.
pub async fn prometheus() -> HttpResponse {
    match metrics::encode() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            warn!("Metrics encode failed: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// GET /admin/circuit-breaker: every circuit's state and counters.
pub async fn circuits_get(state: web::Data<AppState>) -> HttpResponse {
    let stats: serde_json::Map<String, serde_json::Value> = state
        .circuits
        .stats()
        .into_iter()
        .map(|(partner, stats)| (partner, serde_json::to_value(stats).unwrap_or_default()))
        .collect();

    HttpResponse::Ok().json(stats)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitAction {
    Reset,
    ForceOpen,
    ResetAll,
}

#[derive(Debug, Deserialize)]
pub struct CircuitCommand {
    #[serde(default)]
    pub partner: String,
    pub action: CircuitAction,
}

/// POST /admin/circuit-breaker: operator override of circuit state.
pub async fn circuits_post(
    state: web::Data<AppState>,
    command: web::Json<CircuitCommand>,
) -> HttpResponse {
    let ok = match command.action {
        CircuitAction::ResetAll => {
            state.circuits.reset_all();
            true
        }
        CircuitAction::Reset => state.circuits.reset(&command.partner),
        CircuitAction::ForceOpen => state.circuits.force_open(&command.partner),
    };

    if ok {
        HttpResponse::Ok().json(json!({"status": "ok"}))
    } else {
        HttpResponse::NotFound().json(json!({"error": "unknown partner circuit"}))
    }
}

/// GET /admin/currency: rate table summary.
pub async fn currency_get(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.currency.stats())
}
