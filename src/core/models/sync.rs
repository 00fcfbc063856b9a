use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Kind of deployment for a user sync URL, e.g. img or iframe
#[derive(Debug, Clone, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncKind {
    /// User sync deployed as a single img pixel
    Image,
    /// User sync deployed as an iframe, can contain multiple downstream syncs
    Iframe,
}

/// Partner user sync config. The URL may carry the privacy macros
/// `{{GDPR}}`, `{{GDPR_CONSENT}}` and `{{US_PRIVACY}}` which are filled
/// per request by the cookie-sync endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(rename_all = "lowercase")]
pub struct SyncConfig {
    pub url: String,
    pub kind: SyncKind,
}
