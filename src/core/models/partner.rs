use crate::core::models::sync::SyncConfig;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which inventory channels and media formats a partner declares it
/// can buy. A partner is never sent an impression outside its declared
/// capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Capabilities {
    pub site: bool,
    pub app: bool,
    pub banner: bool,
    pub video: bool,
    pub native: bool,
    pub audio: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            site: true,
            app: true,
            banner: true,
            video: true,
            native: true,
            audio: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DemandType {
    #[default]
    Platform,
    Publisher,
}

/// Declared data-handling posture, consulted by the privacy gate.
/// Defaults assume the worst so an undeclared partner is excluded
/// rather than leaked to.
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default)]
pub struct DataPolicy {
    /// Partner performs behavioral targeting (excluded under COPPA)
    pub behavioral: bool,
    /// Partner monetization relies on sale of data (excluded on CCPA opt-out)
    pub sells_data: bool,
}

impl Default for DataPolicy {
    fn default() -> Self {
        Self {
            behavioral: true,
            sells_data: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HttpProto {
    /// Force http1.1 only
    Http1,
    /// Force h2c prior knowledge
    H2c,
    /// Allow, but not force, http2 upgrades via alpn
    #[default]
    Http2,
}

/// A demand partner as configured on the exchange. One adapter instance
/// is constructed per partner at startup from this descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Partner {
    /// Unique short code, also the imp.ext parameter key
    pub code: String,
    pub name: String,
    pub endpoint: String,
    pub capabilities: Capabilities,
    /// IAB Global Vendor List id for TCF consent lookups. A partner
    /// without one never receives EU-regulated traffic.
    pub gvl_vendor_id: Option<u16>,
    pub demand_type: DemandType,
    pub data_policy: DataPolicy,
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub gzip: bool,
    /// Whether the partner accepts all imps in one call or wants
    /// one call per impression
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub multi_imp: bool,
    pub protocol: HttpProto,
    pub usersync: Option<SyncConfig>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undeclared_data_policy_assumes_worst() {
        let partner: Partner = serde_json::from_str(
            r#"{"code":"x","name":"X","endpoint":"https://bid.x.test/rtb"}"#,
        )
        .unwrap();

        assert!(partner.data_policy.behavioral);
        assert!(partner.data_policy.sells_data);
        assert!(partner.gvl_vendor_id.is_none());
        assert!(partner.gzip);
        assert!(partner.multi_imp);
    }
}
