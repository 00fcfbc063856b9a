use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use strum::{Display, EnumString};
use tracing::warn;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PublisherStatus {
    Active,
    #[default]
    Paused,
    Archived,
}

/// Device bucket a slot-level partner config applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceClass {
    #[default]
    All,
    Desktop,
    Mobile,
}

impl DeviceClass {
    pub fn matches(&self, requested: DeviceClass) -> bool {
        matches!(self, DeviceClass::All) || *self == requested
    }
}

/// One partner's opaque parameter blob for one ad slot. The blob is
/// validated against the partner's schema at config load, never at
/// request time.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[builder(default)]
pub struct SlotBidderConfig {
    pub partner: String,
    #[serde(default)]
    pub device_class: DeviceClass,
    pub params: Value,
}

/// A named position on a page or app screen. `pattern` is matched
/// against the request's tagid / ad-unit path: exact, or a trailing
/// `/*` prefix wildcard.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct AdSlot {
    pub pattern: String,
    pub adhesion: bool,
    /// Strict partner filter when non-empty; empty means every partner
    /// configured on the slot is eligible
    pub enabled_bidders: Vec<String>,
    pub bidders: Vec<SlotBidderConfig>,
}

impl AdSlot {
    pub fn matches(&self, unit: &str) -> bool {
        if let Some(prefix) = self.pattern.strip_suffix("/*") {
            return unit == prefix || unit.starts_with(&format!("{}/", prefix));
        }

        self.pattern == unit
    }

    pub fn partner_params(&self, partner: &str, device: DeviceClass) -> Option<&Value> {
        if !self.enabled_bidders.is_empty()
            && !self.enabled_bidders.iter().any(|b| b == partner)
        {
            return None;
        }

        self.bidders
            .iter()
            .find(|b| b.partner == partner && b.device_class.matches(device))
            .map(|b| &b.params)
    }
}

/// Resolved configuration for a publisher account. By the time the
/// coordinator sees one of these every default has been filled in by
/// [`Publisher::normalized`]; absent and disabled are distinguished by
/// the explicit status enum, never by sentinel values.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Publisher {
    pub id: String,
    pub name: String,
    pub status: PublisherStatus,
    /// Exact entries or `*.domain` wildcards. Empty means the
    /// publisher has not restricted serving domains.
    pub allowed_domains: Vec<String>,
    /// 0 means inherit the exchange default
    pub default_tmax_ms: u64,
    pub bid_multiplier: f64,
    /// Partner code -> minimum price override, in the exchange
    /// default currency
    pub floor_adjustments: HashMap<String, f64>,
    pub ad_slots: Vec<AdSlot>,
}

impl Publisher {
    /// Fills invalid or absent values so downstream code never branches
    /// on zero-vs-missing. Multiplier 0 (or negative) is invalid config
    /// and coerces to 1.0 with a warning.
    pub fn normalized(mut self) -> Self {
        if self.bid_multiplier <= 0.0 {
            if self.bid_multiplier != 0.0 {
                warn!(
                    "Publisher {} has invalid bid_multiplier {}, using 1.0",
                    self.id, self.bid_multiplier
                );
            }
            self.bid_multiplier = 1.0;
        }

        self
    }

    pub fn domain_allowed(&self, domain: &str) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }

        let domain = domain.to_ascii_lowercase();

        self.allowed_domains.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();

            match allowed.strip_prefix("*.") {
                Some(apex) => domain == apex || domain.ends_with(&format!(".{}", apex)),
                None => domain == allowed,
            }
        })
    }

    pub fn find_slot(&self, unit: &str) -> Option<&AdSlot> {
        self.ad_slots.iter().find(|slot| slot.matches(unit))
    }

    pub fn floor_adjustment(&self, partner: &str) -> f64 {
        self.floor_adjustments.get(partner).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn publisher_with_domains(domains: &[&str]) -> Publisher {
        Publisher {
            id: "p-1".to_string(),
            allowed_domains: domains.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
        .normalized()
    }

    #[test]
    fn test_domain_exact_and_wildcard() {
        let publisher = publisher_with_domains(&["example.com", "*.news.test"]);

        assert!(publisher.domain_allowed("example.com"));
        assert!(publisher.domain_allowed("EXAMPLE.com"));
        assert!(!publisher.domain_allowed("sub.example.com"));
        assert!(publisher.domain_allowed("news.test"));
        assert!(publisher.domain_allowed("sports.news.test"));
        assert!(!publisher.domain_allowed("newsxtest"));
    }

    #[test]
    fn test_unrestricted_domains_allow_all() {
        let publisher = publisher_with_domains(&[]);
        assert!(publisher.domain_allowed("anything.test"));
    }

    #[test]
    fn test_zero_multiplier_normalizes_to_one() {
        let publisher = Publisher {
            bid_multiplier: 0.0,
            ..Default::default()
        }
        .normalized();

        assert_eq!(publisher.bid_multiplier, 1.0);
    }

    #[test]
    fn test_slot_pattern_wildcard() {
        let slot = AdSlot {
            pattern: "example.com/sports/*".to_string(),
            ..Default::default()
        };

        assert!(slot.matches("example.com/sports"));
        assert!(slot.matches("example.com/sports/football"));
        assert!(!slot.matches("example.com/news"));
    }

    #[test]
    fn test_enabled_bidders_strict_filter() {
        let slot = AdSlot {
            pattern: "example.com/top".to_string(),
            enabled_bidders: vec!["x".to_string()],
            bidders: vec![
                SlotBidderConfig {
                    partner: "x".to_string(),
                    device_class: DeviceClass::All,
                    params: json!({"placement": 1}),
                },
                SlotBidderConfig {
                    partner: "y".to_string(),
                    device_class: DeviceClass::All,
                    params: json!({"placement": 2}),
                },
            ],
            ..Default::default()
        };

        assert!(slot.partner_params("x", DeviceClass::Desktop).is_some());
        assert!(slot.partner_params("y", DeviceClass::Desktop).is_none());
    }

    #[test]
    fn test_device_class_buckets() {
        let slot = AdSlot {
            pattern: "d".to_string(),
            bidders: vec![SlotBidderConfig {
                partner: "x".to_string(),
                device_class: DeviceClass::Mobile,
                params: json!({}),
            }],
            ..Default::default()
        };

        assert!(slot.partner_params("x", DeviceClass::Mobile).is_some());
        assert!(slot.partner_params("x", DeviceClass::Desktop).is_none());
    }
}
