//! Prometheus metric handles. Registered against the default registry
//! and scraped at `GET /metrics`.

use prometheus::{
    Encoder, HistogramVec, IntCounterVec, TextEncoder, register_histogram_vec,
    register_int_counter_vec,
};
use std::sync::LazyLock;

pub static AUCTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "hbx_auctions_total",
        "Auctions processed by endpoint and outcome",
        &["endpoint", "outcome"]
    )
    .expect("metric registration")
});

pub static AUCTION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "hbx_auction_duration_seconds",
        "Wall-clock auction duration",
        &["endpoint"],
        vec![0.005, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("metric registration")
});

pub static PARTNER_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "hbx_partner_requests_total",
        "Partner dispatches by outcome",
        &["partner", "outcome"]
    )
    .expect("metric registration")
});

pub static PARTNER_LATENCY: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "hbx_partner_latency_seconds",
        "Partner callout latency",
        &["partner"],
        vec![0.01, 0.025, 0.05, 0.1, 0.2, 0.35, 0.5, 1.0, 2.5]
    )
    .expect("metric registration")
});

pub static PARTNER_EXCLUSIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "hbx_partner_exclusions_total",
        "Partners excluded from selection by reason",
        &["partner", "reason"]
    )
    .expect("metric registration")
});

pub static BIDS_DROPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "hbx_bids_dropped_total",
        "Returned bids dropped before clearing by reason",
        &["reason"]
    )
    .expect("metric registration")
});

pub static ANALYTICS_DROPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "hbx_analytics_dropped_total",
        "Analytics records dropped from a full sink queue",
        &["sink"]
    )
    .expect("metric registration")
});

pub static ANALYTICS_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "hbx_analytics_failures_total",
        "Analytics sink delivery failures",
        &["sink"]
    )
    .expect("metric registration")
});

pub static CIRCUIT_TRANSITIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "hbx_circuit_transitions_total",
        "Circuit breaker state transitions",
        &["partner", "to"]
    )
    .expect("metric registration")
});

/// Scrape body for the metrics endpoint.
pub fn encode() -> Result<String, anyhow::Error> {
    let families = prometheus::gather();
    let mut buf = Vec::new();

    TextEncoder::new().encode(&families, &mut buf)?;

    Ok(String::from_utf8(buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_encode() {
        AUCTIONS_TOTAL.with_label_values(&["/openrtb2/auction", "bid"]).inc();
        PARTNER_REQUESTS.with_label_values(&["x", "timeout"]).inc();

        let body = encode().unwrap();
        assert!(body.contains("hbx_auctions_total"));
        assert!(body.contains("hbx_partner_requests_total"));
    }
}
