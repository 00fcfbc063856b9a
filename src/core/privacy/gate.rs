use crate::core::models::auction::ExclusionReason;
use crate::core::models::partner::Partner;
use crate::core::privacy::anonymize::{anonymize_ipv4, anonymize_ipv6};
use crate::core::privacy::regulation::{self, Regulation};
use crate::core::privacy::tcf::TcfConsent;
use crate::core::privacy::usprivacy::UsPrivacy;
use crate::core::spec::openrtb::BidRequest;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// TCF purpose 1, storage/access on a device. Non-negotiable for any
/// partner call under GDPR.
const PURPOSE_STORAGE: u8 = 1;
/// Purposes 3 and 4, ad personalisation. Without both, device
/// identifiers are stripped from outbound requests.
const PURPOSE_CREATE_PROFILE: u8 = 3;
const PURPOSE_SELECT_PERSONALISED: u8 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    pub enforce_gdpr: bool,
    pub enforce_ccpa: bool,
    pub enforce_coppa: bool,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            enforce_gdpr: true,
            enforce_ccpa: true,
            enforce_coppa: true,
        }
    }
}

/// Per-request privacy assessment, computed once and shared by every
/// partner decision in the auction.
pub struct PrivacyPosture {
    pub regulation: Regulation,
    pub consent: Option<TcfConsent>,
    /// Whether a GDPR request carried a parseable consent string
    pub consent_ok: bool,
    pub ccpa_opt_out: bool,
}

impl PrivacyPosture {
    pub fn unregulated() -> Self {
        PrivacyPosture {
            regulation: Regulation::None,
            consent: None,
            consent_ok: false,
            ccpa_opt_out: false,
        }
    }
}

/// What must be rewritten on outbound data for an allowed partner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Obligations {
    pub anonymize_ip: bool,
    pub strip_device_ids: bool,
}

pub struct PrivacyGate {
    cfg: PrivacyConfig,
}

impl PrivacyGate {
    pub fn new(cfg: PrivacyConfig) -> Self {
        PrivacyGate { cfg }
    }

    pub fn assess(&self, req: &BidRequest) -> PrivacyPosture {
        let detected = regulation::detect(req);

        let enforced = match detected {
            Regulation::Gdpr if !self.cfg.enforce_gdpr => Regulation::None,
            Regulation::Ccpa if !self.cfg.enforce_ccpa => Regulation::None,
            Regulation::Coppa if !self.cfg.enforce_coppa => Regulation::None,
            other => other,
        };

        let mut posture = PrivacyPosture {
            regulation: enforced,
            ..PrivacyPosture::unregulated()
        };

        match enforced {
            Regulation::Gdpr => {
                let consent_str = req.user.as_ref().and_then(|u| u.consent_string());

                posture.consent = consent_str.and_then(|s| match TcfConsent::parse(s) {
                    Ok(consent) => Some(consent),
                    Err(e) => {
                        debug!("Unusable consent string: {}", e);
                        None
                    }
                });
                posture.consent_ok = posture.consent.is_some();
            }
            Regulation::Ccpa => {
                posture.ccpa_opt_out = req
                    .regs
                    .as_ref()
                    .and_then(|r| r.us_privacy_string())
                    .and_then(UsPrivacy::parse)
                    .map(|p| p.opted_out_of_sale())
                    .unwrap_or(false);
            }
            _ => {}
        }

        posture
    }

    /// Allow/deny for one partner, plus outbound obligations when
    /// allowed. A partner whose declaration is missing the data needed
    /// to decide is excluded.
    pub fn partner_decision(
        &self,
        posture: &PrivacyPosture,
        partner: &Partner,
    ) -> Result<Obligations, ExclusionReason> {
        match posture.regulation {
            Regulation::Gdpr => {
                let consent = posture
                    .consent
                    .as_ref()
                    .ok_or(ExclusionReason::NoConsent)?;

                let vendor_id = partner
                    .gvl_vendor_id
                    .ok_or(ExclusionReason::NoConsent)?;

                if !consent.vendor(vendor_id) || !consent.purpose(PURPOSE_STORAGE) {
                    return Err(ExclusionReason::NoConsent);
                }

                let personalisation_ok = consent.purpose(PURPOSE_CREATE_PROFILE)
                    && consent.purpose(PURPOSE_SELECT_PERSONALISED);

                Ok(Obligations {
                    anonymize_ip: true,
                    strip_device_ids: !personalisation_ok,
                })
            }
            Regulation::Ccpa => {
                if posture.ccpa_opt_out && partner.data_policy.sells_data {
                    return Err(ExclusionReason::NoConsent);
                }

                Ok(Obligations::default())
            }
            Regulation::Coppa => {
                if partner.data_policy.behavioral {
                    return Err(ExclusionReason::NoConsent);
                }

                Ok(Obligations {
                    anonymize_ip: false,
                    strip_device_ids: true,
                })
            }
            Regulation::None => Ok(Obligations::default()),
        }
    }
}

/// Rewrites an outbound request in place per the obligations computed
/// for its partner. An address that fails to parse is dropped entirely
/// rather than sent through unmasked.
pub fn apply_obligations(req: &mut BidRequest, obligations: Obligations) {
    if obligations.anonymize_ip {
        if let Some(device) = req.device.as_mut() {
            if !device.ip.is_empty() {
                device.ip = anonymize_ipv4(&device.ip).unwrap_or_default();
            }
            if !device.ipv6.is_empty() {
                device.ipv6 = anonymize_ipv6(&device.ipv6).unwrap_or_default();
            }
        }
    }

    if obligations.strip_device_ids {
        if let Some(device) = req.device.as_mut() {
            device.ifa.clear();
        }

        if let Some(user) = req.user.as_mut() {
            user.id.clear();
            user.buyeruid.clear();

            if let Some(ext) = user.ext.as_mut() {
                if let Some(map) = ext.as_object_mut() {
                    map.remove("eids");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::partner::{DataPolicy, PartnerBuilder};
    use crate::core::spec::openrtb::{Device, Geo, Regs, User};

    fn partner_with_gvl(gvl: Option<u16>) -> Partner {
        PartnerBuilder::default()
            .code("x".to_string())
            .gvl_vendor_id(gvl)
            .build()
            .unwrap()
    }

    fn gdpr_request(consent: &str) -> BidRequest {
        BidRequest {
            regs: Some(Regs {
                gdpr: Some(1),
                ..Default::default()
            }),
            user: Some(User {
                consent: consent.to_string(),
                ..Default::default()
            }),
            device: Some(Device {
                ip: "203.0.113.42".to_string(),
                geo: Some(Geo {
                    country: "DEU".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    // vendor 52 consented with purposes 1+3+4, vendor 76 not
    fn consent_for_52() -> String {
        use crate::core::privacy::tcf::test_strings::bitfield;
        bitfield(&[1, 3, 4], 100, &[52])
    }

    #[test]
    fn test_gdpr_vendor_consent_split() {
        let gate = PrivacyGate::new(PrivacyConfig::default());
        let posture = gate.assess(&gdpr_request(&consent_for_52()));

        assert_eq!(posture.regulation, Regulation::Gdpr);
        assert!(posture.consent_ok);

        let allowed = gate.partner_decision(&posture, &partner_with_gvl(Some(52)));
        assert!(allowed.is_ok());
        assert!(allowed.unwrap().anonymize_ip);

        let denied = gate.partner_decision(&posture, &partner_with_gvl(Some(76)));
        assert_eq!(denied.unwrap_err(), ExclusionReason::NoConsent);
    }

    #[test]
    fn test_gdpr_without_declared_vendor_id_excludes() {
        let gate = PrivacyGate::new(PrivacyConfig::default());
        let posture = gate.assess(&gdpr_request(&consent_for_52()));

        let denied = gate.partner_decision(&posture, &partner_with_gvl(None));
        assert_eq!(denied.unwrap_err(), ExclusionReason::NoConsent);
    }

    #[test]
    fn test_gdpr_missing_consent_excludes_everyone() {
        let gate = PrivacyGate::new(PrivacyConfig::default());
        let posture = gate.assess(&gdpr_request("garbage"));

        assert!(!posture.consent_ok);
        assert!(gate
            .partner_decision(&posture, &partner_with_gvl(Some(52)))
            .is_err());
    }

    #[test]
    fn test_gdpr_not_enforced_passes_through() {
        let gate = PrivacyGate::new(PrivacyConfig {
            enforce_gdpr: false,
            ..Default::default()
        });

        let posture = gate.assess(&gdpr_request(""));
        assert_eq!(posture.regulation, Regulation::None);
    }

    #[test]
    fn test_ccpa_opt_out_excludes_sellers() {
        let gate = PrivacyGate::new(PrivacyConfig::default());

        let req = BidRequest {
            regs: Some(Regs {
                us_privacy: Some("1YYN".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let posture = gate.assess(&req);
        assert_eq!(posture.regulation, Regulation::Ccpa);
        assert!(posture.ccpa_opt_out);

        let seller = partner_with_gvl(Some(1));
        assert!(gate.partner_decision(&posture, &seller).is_err());

        let mut contextual = partner_with_gvl(Some(1));
        contextual.data_policy = DataPolicy {
            behavioral: false,
            sells_data: false,
        };
        assert!(gate.partner_decision(&posture, &contextual).is_ok());
    }

    #[test]
    fn test_coppa_keeps_contextual_only() {
        let gate = PrivacyGate::new(PrivacyConfig::default());

        let req = BidRequest {
            regs: Some(Regs {
                coppa: 1,
                ..Default::default()
            }),
            ..Default::default()
        };

        let posture = gate.assess(&req);
        assert_eq!(posture.regulation, Regulation::Coppa);

        let behavioral = partner_with_gvl(None);
        assert!(gate.partner_decision(&posture, &behavioral).is_err());

        let mut contextual = partner_with_gvl(None);
        contextual.data_policy.behavioral = false;
        let obligations = gate.partner_decision(&posture, &contextual).unwrap();
        assert!(obligations.strip_device_ids);
    }

    #[test]
    fn test_obligations_rewrite_outbound() {
        let mut req = gdpr_request("");
        req.device.as_mut().unwrap().ipv6 =
            "2001:db8:85a3:8d3:1319:8a2e:370:7348".to_string();
        req.device.as_mut().unwrap().ifa = "ifa-123".to_string();
        req.user.as_mut().unwrap().buyeruid = "buyer-1".to_string();

        apply_obligations(
            &mut req,
            Obligations {
                anonymize_ip: true,
                strip_device_ids: true,
            },
        );

        let device = req.device.as_ref().unwrap();
        assert_eq!(device.ip, "203.0.113.0");
        assert_eq!(device.ipv6, "2001:db8:85a3::");
        assert!(device.ifa.is_empty());
        assert!(req.user.as_ref().unwrap().buyeruid.is_empty());
    }
}
