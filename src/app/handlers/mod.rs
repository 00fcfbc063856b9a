//! HTTP surface. Handlers adapt wire shapes to an [`AuctionContext`],
//! run the shared auction pipeline, and map the context's terminal
//! state back to status codes. Partner-level failures never surface
//! here; only pre-auction rejection and platform faults do.

pub mod admin;
pub mod openrtb;
pub mod slots;
pub mod sync;
pub mod video;

use crate::app::config::HbxConfig;
use crate::app::pipeline::auction::AuctionContext;
use crate::app::pipeline::auction::context::RequestReject;
use crate::core::adapters::registry::AdapterRegistry;
use crate::core::breaker::CircuitRegistry;
use crate::core::currency::CurrencyService;
use crate::core::pipeline::Pipeline;
use crate::core::publishers::PublisherStore;
use crate::sample_or_attach_root_span;
use actix_web::{HttpRequest, HttpResponse};
use anyhow::Error;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{Instrument, debug};

/// Shared state handed to every route.
pub struct AppState {
    pub config: Arc<HbxConfig>,
    pub pipeline: Arc<Pipeline<AuctionContext, Error>>,
    pub circuits: Arc<CircuitRegistry>,
    pub currency: Arc<CurrencyService>,
    pub adapters: AdapterRegistry,
    pub store: Arc<dyn PublisherStore>,
    pub rate_limiter: Option<DefaultDirectRateLimiter>,
}

impl AppState {
    pub fn build_rate_limiter(qps: u32) -> Option<DefaultDirectRateLimiter> {
        let qps = NonZeroU32::new(qps)?;
        Some(RateLimiter::direct(Quota::per_second(qps)))
    }

    /// Server-boundary backpressure: over the configured rate the
    /// request is refused before any work happens.
    pub fn over_rate_limit(&self) -> bool {
        match &self.rate_limiter {
            Some(limiter) => limiter.check().is_err(),
            None => false,
        }
    }
}

pub fn rate_limited_response() -> HttpResponse {
    HttpResponse::TooManyRequests().json(json!({"error": "rate limit exceeded"}))
}

/// Maps a pre-auction rejection to its status code.
pub fn reject_response(reject: &RequestReject) -> HttpResponse {
    match reject {
        RequestReject::BadRequest(message) => {
            HttpResponse::BadRequest().json(json!({"error": message}))
        }
        RequestReject::UnknownPublisher => {
            HttpResponse::Unauthorized().json(json!({"error": "unknown or suspended publisher"}))
        }
        RequestReject::PublisherSuspended => {
            HttpResponse::Unauthorized().json(json!({"error": "unknown or suspended publisher"}))
        }
        RequestReject::UnauthorizedDomain => {
            HttpResponse::Forbidden().json(json!({"error": "domain not allowed"}))
        }
        RequestReject::Internal(message) => {
            HttpResponse::InternalServerError().json(json!({"error": message}))
        }
    }
}

/// Runs one auction under a sampled root span. The pipeline aborting
/// early is a normal outcome; the context carries whatever terminal
/// state was assigned.
pub async fn run_auction(state: &AppState, context: &AuctionContext) {
    let sample_rate = state.config.logging.span_sample_rate;
    let root_span = sample_or_attach_root_span!(sample_rate, "handle_auction");

    let pipeline = state.pipeline.clone();

    async {
        match pipeline.run(context).await {
            Ok(_) => debug!("Auction pipeline success"),
            Err(e) => debug!("Auction pipeline aborted: {}", e),
        }
    }
    .instrument(root_span)
    .await;
}

pub fn client_ip(http_req: &HttpRequest) -> String {
    let info = http_req.connection_info();

    let Some(addr) = info.realip_remote_addr() else {
        return String::new();
    };

    // strip a :port suffix from v4 peers; v6 literals pass through
    match addr.rsplit_once(':') {
        Some((host, port))
            if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) =>
        {
            host.to_string()
        }
        _ => addr.to_string(),
    }
}

pub fn user_agent(http_req: &HttpRequest) -> String {
    http_req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
