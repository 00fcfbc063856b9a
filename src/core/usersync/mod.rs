//! Partner user-sync URL generation for the cookie-sync endpoint.
//! Sync URLs are configured per partner with privacy macros filled in
//! per request, so a consent-gated partner never receives a bare sync.

use crate::core::models::partner::Partner;
use crate::core::models::sync::SyncKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The macro placeholders partners may embed in their sync URLs.
pub const GDPR_MACRO: &str = "{{GDPR}}";
pub const GDPR_CONSENT_MACRO: &str = "{{GDPR_CONSENT}}";
pub const US_PRIVACY_MACRO: &str = "{{US_PRIVACY}}";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SyncRequest {
    /// Restrict to these partner codes; empty means all
    #[serde(default)]
    pub bidders: Vec<String>,
    #[serde(default)]
    pub gdpr: Option<i32>,
    #[serde(default)]
    pub gdpr_consent: Option<String>,
    #[serde(default)]
    pub us_privacy: Option<String>,
    /// Cap on returned syncs, 0 = no cap
    #[serde(default)]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartnerSync {
    pub partner: String,
    pub url: String,
    pub kind: SyncKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub syncs: Vec<PartnerSync>,
}

fn fill_macros(url: &str, req: &SyncRequest) -> String {
    url.replace(
        GDPR_MACRO,
        &req.gdpr.map(|v| v.to_string()).unwrap_or_default(),
    )
    .replace(GDPR_CONSENT_MACRO, req.gdpr_consent.as_deref().unwrap_or(""))
    .replace(US_PRIVACY_MACRO, req.us_privacy.as_deref().unwrap_or(""))
}

/// Builds the sync list for one request. Partners without a sync
/// config are skipped silently.
pub fn build_syncs(partners: &[Arc<Partner>], req: &SyncRequest) -> SyncResponse {
    let mut syncs = Vec::new();

    for partner in partners {
        if !req.bidders.is_empty() && !req.bidders.iter().any(|b| b == &partner.code) {
            continue;
        }

        let Some(sync) = &partner.usersync else {
            continue;
        };

        syncs.push(PartnerSync {
            partner: partner.code.clone(),
            url: fill_macros(&sync.url, req),
            kind: sync.kind.clone(),
        });

        if req.limit > 0 && syncs.len() >= req.limit {
            break;
        }
    }

    SyncResponse { syncs }
}
