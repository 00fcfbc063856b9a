use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct BidRequest {
    pub id: String,
    pub imp: Vec<Imp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regs: Option<Regs>,
    /// Auction deadline in ms, 0 when the caller sent none
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub tmax: u64,
    /// Accepted currencies, first is preferred
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cur: Vec<String>,
    /// Auction type, 2 = second price
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub at: i32,
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub test: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl BidRequest {
    /// The inventory domain used for publisher domain authorization:
    /// site domain, else app domain, else app bundle.
    pub fn inventory_domain(&self) -> Option<&str> {
        if let Some(site) = &self.site {
            if !site.domain.is_empty() {
                return Some(&site.domain);
            }
        }

        if let Some(app) = &self.app {
            if !app.domain.is_empty() {
                return Some(&app.domain);
            }
            if !app.bundle.is_empty() {
                return Some(&app.bundle);
            }
        }

        None
    }

    pub fn has_inventory(&self) -> bool {
        self.site.is_some() || self.app.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Imp {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<Native>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tagid: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub bidfloor: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bidfloorcur: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl Imp {
    pub fn has_media_type(&self) -> bool {
        self.banner.is_some() || self.video.is_some() || self.native.is_some() || self.audio.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Banner {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Format {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Video {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
    pub minduration: i32,
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub maxduration: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<i32>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub w: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub h: u32,
    /// Legacy placement signal, superseded by `plcmt`
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub placement: i32,
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub plcmt: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Native {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Audio {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
    pub minduration: i32,
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub maxduration: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Site {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub page: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct App {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bundle: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub storeurl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
}

/// The supply-side publisher object carried on site/app. Distinct from
/// the resolved account config in `core::models::publisher`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Publisher {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Device {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ua: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ipv6: String,
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub devicetype: i32,
    /// Advertising identifier, stripped under privacy obligations
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ifa: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Geo {
    /// ISO-3166-1 alpha-3
    #[serde(skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct User {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub buyeruid: String,
    /// TCF consent string (2.6 field position)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub consent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl User {
    /// Consent string from the 2.6 field, falling back to the 2.5
    /// `user.ext.consent` placement.
    pub fn consent_string(&self) -> Option<&str> {
        if !self.consent.is_empty() {
            return Some(&self.consent);
        }

        self.ext
            .as_ref()
            .and_then(|ext| ext.get("consent"))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Regs {
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub coppa: i32,
    /// 2.6 field position; 2.5 senders put this under ext
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr: Option<i32>,
    #[serde(rename = "us_privacy", skip_serializing_if = "Option::is_none")]
    pub us_privacy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl Regs {
    pub fn gdpr_flag(&self) -> Option<i32> {
        if self.gdpr.is_some() {
            return self.gdpr;
        }

        self.ext
            .as_ref()
            .and_then(|ext| ext.get("gdpr"))
            .and_then(Value::as_i64)
            .map(|v| v as i32)
    }

    pub fn us_privacy_string(&self) -> Option<&str> {
        if let Some(s) = &self.us_privacy {
            return Some(s);
        }

        self.ext
            .as_ref()
            .and_then(|ext| ext.get("us_privacy"))
            .and_then(Value::as_str)
    }

    /// Whether the EU DSA transparency ext is present on the request.
    pub fn dsa_required(&self) -> bool {
        self.ext
            .as_ref()
            .map(|ext| ext.get("dsa").is_some())
            .unwrap_or(false)
    }
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regs_gdpr_falls_back_to_ext() {
        let regs: Regs = serde_json::from_str(r#"{"ext":{"gdpr":1}}"#).unwrap();
        assert_eq!(regs.gdpr_flag(), Some(1));

        let regs: Regs = serde_json::from_str(r#"{"gdpr":0,"ext":{"gdpr":1}}"#).unwrap();
        assert_eq!(regs.gdpr_flag(), Some(0));
    }

    #[test]
    fn test_us_privacy_from_field_or_ext() {
        let regs: Regs = serde_json::from_str(r#"{"us_privacy":"1YNN"}"#).unwrap();
        assert_eq!(regs.us_privacy_string(), Some("1YNN"));

        let regs: Regs = serde_json::from_str(r#"{"ext":{"us_privacy":"1YYN"}}"#).unwrap();
        assert_eq!(regs.us_privacy_string(), Some("1YYN"));
    }

    #[test]
    fn test_user_consent_from_ext() {
        let user: User = serde_json::from_str(r#"{"ext":{"consent":"CPc"}}"#).unwrap();
        assert_eq!(user.consent_string(), Some("CPc"));
    }

    #[test]
    fn test_inventory_domain_prefers_site() {
        let req = BidRequestBuilder::default()
            .site(Some(SiteBuilder::default().domain("example.com".to_string()).build().unwrap()))
            .app(Some(AppBuilder::default().bundle("com.example.app".to_string()).build().unwrap()))
            .build()
            .unwrap();

        assert_eq!(req.inventory_domain(), Some("example.com"));
    }

    #[test]
    fn test_empty_fields_not_serialized() {
        let req = BidRequest::default();
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"id":"","imp":[]}"#);
    }
}
