use crate::core::spec::openrtb::BidRequest;
use serde::{Deserialize, Serialize};
use strum::Display;

/// EU/EEA member states plus the UK, ISO-3166-1 alpha-3.
const GDPR_COUNTRIES: &[&str] = &[
    "AUT", "BEL", "BGR", "HRV", "CYP", "CZE", "DNK", "EST", "FIN", "FRA", "DEU", "GRC", "HUN",
    "IRL", "ITA", "LVA", "LTU", "LUX", "MLT", "NLD", "POL", "PRT", "ROU", "SVK", "SVN", "ESP",
    "SWE", "ISL", "LIE", "NOR", "GBR",
];

/// US states with CCPA-like privacy statutes, by region code.
const CCPA_REGIONS: &[&str] = &["CA", "VA", "CO", "CT", "UT"];

const US_COUNTRIES: &[&str] = &["USA", "US"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Regulation {
    Gdpr,
    Ccpa,
    Coppa,
    #[default]
    None,
}

fn geo_countries(req: &BidRequest) -> impl Iterator<Item = &str> {
    let device_geo = req.device.as_ref().and_then(|d| d.geo.as_ref());
    let user_geo = req.user.as_ref().and_then(|u| u.geo.as_ref());

    // both geos are inspected; either one placing the user in a
    // regulated zone applies the regulation
    device_geo
        .into_iter()
        .chain(user_geo)
        .map(|g| g.country.as_str())
        .filter(|c| !c.is_empty())
}

fn geo_regions(req: &BidRequest) -> impl Iterator<Item = (&str, &str)> {
    let device_geo = req.device.as_ref().and_then(|d| d.geo.as_ref());
    let user_geo = req.user.as_ref().and_then(|u| u.geo.as_ref());

    device_geo
        .into_iter()
        .chain(user_geo)
        .map(|g| (g.country.as_str(), g.region.as_str()))
}

fn in_gdpr_zone(req: &BidRequest) -> bool {
    geo_countries(req).any(|c| GDPR_COUNTRIES.contains(&c.to_ascii_uppercase().as_str()))
}

fn in_ccpa_zone(req: &BidRequest) -> bool {
    geo_regions(req).any(|(country, region)| {
        US_COUNTRIES.contains(&country.to_ascii_uppercase().as_str())
            && CCPA_REGIONS.contains(&region.to_ascii_uppercase().as_str())
    })
}

/// Regulation detection, first match wins:
/// explicit gdpr flag, EU/EEA geo, us-privacy signal or CCPA geo,
/// coppa flag, none.
pub fn detect(req: &BidRequest) -> Regulation {
    let regs = req.regs.as_ref();

    if regs.and_then(|r| r.gdpr_flag()) == Some(1) {
        return Regulation::Gdpr;
    }

    if in_gdpr_zone(req) {
        return Regulation::Gdpr;
    }

    let has_us_privacy = regs
        .and_then(|r| r.us_privacy_string())
        .map(|s| !s.is_empty())
        .unwrap_or(false);

    if has_us_privacy || in_ccpa_zone(req) {
        return Regulation::Ccpa;
    }

    if regs.map(|r| r.coppa == 1).unwrap_or(false) {
        return Regulation::Coppa;
    }

    Regulation::None
}
