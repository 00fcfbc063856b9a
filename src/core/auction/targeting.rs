//! Targeting-key emission for downstream ad servers. Keys are
//! partner-suffixed so this stack can coexist with other header-bidding
//! wrappers on the same page; the winner additionally gets the
//! unsuffixed key set.

use crate::core::models::auction::TypedBid;
use std::collections::BTreeMap;

/// Prices above the cap all land in the top bucket.
pub const PRICE_BUCKET_MAX: f64 = 20.0;

/// Coarse price bucket: floored to the cent and capped. Keeps the
/// key-value cardinality the ad server sees bounded.
pub fn price_bucket(price: f64) -> String {
    let capped = price.clamp(0.0, PRICE_BUCKET_MAX);
    let floored = (capped * 100.0).floor() / 100.0;

    format!("{:.2}", floored)
}

/// Keys for one winning bid. `dsa` adds the advertiser-domain and
/// render-flag keys the EU transparency rules require.
pub fn keys_for_winner(bid: &TypedBid, dsa: bool) -> BTreeMap<String, String> {
    let mut keys = BTreeMap::new();
    let code = &bid.partner;
    let bucket = price_bucket(bid.adjusted_price);

    keys.insert(format!("hb_pb_{}", code), bucket.clone());
    keys.insert("hb_pb".to_string(), bucket);
    keys.insert("hb_partner".to_string(), code.clone());

    if !bid.creative_id.is_empty() {
        keys.insert(format!("hb_adid_{}", code), bid.creative_id.clone());
        keys.insert("hb_adid".to_string(), bid.creative_id.clone());
    }

    if bid.w > 0 && bid.h > 0 {
        let size = format!("{}x{}", bid.w, bid.h);
        keys.insert(format!("hb_size_{}", code), size.clone());
        keys.insert("hb_size".to_string(), size);
    }

    if !bid.deal_id.is_empty() {
        keys.insert(format!("hb_deal_{}", code), bid.deal_id.clone());
    }

    keys.insert(format!("hb_format_{}", code), bid.media_type.to_string());

    if dsa {
        if let Some(adomain) = bid.adomain.first() {
            keys.insert(format!("hb_adomain_{}", code), adomain.clone());
        }
        keys.insert(format!("hb_dsa_render_{}", code), "1".to_string());
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::auction::MediaType;

    fn winner() -> TypedBid {
        TypedBid {
            partner: "x".to_string(),
            imp_id: "1".to_string(),
            price: 2.50,
            currency: "USD".to_string(),
            converted_price: 2.50,
            adjusted_price: 2.50,
            media_type: MediaType::Banner,
            creative_id: "c1".to_string(),
            adomain: vec!["adv.com".to_string()],
            w: 300,
            h: 250,
            ..Default::default()
        }
    }

    #[test]
    fn test_price_bucket_floors_and_caps() {
        assert_eq!(price_bucket(2.50), "2.50");
        assert_eq!(price_bucket(2.509), "2.50");
        assert_eq!(price_bucket(0.0), "0.00");
        assert_eq!(price_bucket(57.3), "20.00");
    }

    #[test]
    fn test_winner_key_set() {
        let keys = keys_for_winner(&winner(), false);

        assert_eq!(keys.get("hb_pb_x").unwrap(), "2.50");
        assert_eq!(keys.get("hb_pb").unwrap(), "2.50");
        assert_eq!(keys.get("hb_partner").unwrap(), "x");
        assert_eq!(keys.get("hb_adid_x").unwrap(), "c1");
        assert_eq!(keys.get("hb_size_x").unwrap(), "300x250");
        assert_eq!(keys.get("hb_format_x").unwrap(), "banner");
        assert!(!keys.contains_key("hb_deal_x"));
        assert!(!keys.contains_key("hb_adomain_x"));
    }

    #[test]
    fn test_deal_and_dsa_keys() {
        let mut bid = winner();
        bid.deal_id = "deal-9".to_string();

        let keys = keys_for_winner(&bid, true);

        assert_eq!(keys.get("hb_deal_x").unwrap(), "deal-9");
        assert_eq!(keys.get("hb_adomain_x").unwrap(), "adv.com");
        assert_eq!(keys.get("hb_dsa_render_x").unwrap(), "1");
    }

    #[test]
    fn test_sizeless_bid_omits_size_key() {
        let mut bid = winner();
        bid.w = 0;

        let keys = keys_for_winner(&bid, false);
        assert!(!keys.contains_key("hb_size_x"));
    }
}
