use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct BidResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seatbid: Vec<SeatBid>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cur: String,
    /// No-bid reason, present only on empty responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbr: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct SeatBid {
    pub bid: Vec<Bid>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub seat: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Bid {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub impid: String,
    pub price: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub adm: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub nurl: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub crid: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub adomain: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dealid: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub w: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub h: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bid_round_trips_without_noise() {
        let bid = BidBuilder::default()
            .impid("1".to_string())
            .price(2.5)
            .crid("c1".to_string())
            .build()
            .unwrap();

        let json = serde_json::to_string(&bid).unwrap();
        assert_eq!(json, r#"{"impid":"1","price":2.5,"crid":"c1"}"#);

        let back: Bid = serde_json::from_str(&json).unwrap();
        assert_eq!(back.price, 2.5);
        assert!(back.adomain.is_empty());
    }
}
