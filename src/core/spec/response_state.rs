use crate::core::spec::openrtb::BidResponse;
use actix_web::http::header::ContentType;
use actix_web::{HttpRequest, HttpResponse, Responder};
use tracing::warn;

/// The terminal outcome of request processing, attached once to the
/// auction context. A no-bid is still a successful auction at the HTTP
/// layer and serializes as an empty OpenRTB response with an `nbr`.
#[derive(Debug, Clone)]
pub enum BidResponseState {
    Bid(BidResponse),
    NoBid {
        desc: Option<String>,
    },
    NoBidReason {
        reqid: String,
        nbr: u32,
        desc: Option<String>,
    },
}

impl BidResponseState {
    pub fn to_response(&self) -> BidResponse {
        match self {
            BidResponseState::Bid(res) => res.clone(),
            BidResponseState::NoBid { .. } => BidResponse::default(),
            BidResponseState::NoBidReason { reqid, nbr, .. } => BidResponse {
                id: reqid.clone(),
                nbr: Some(*nbr),
                ..Default::default()
            },
        }
    }
}

/// Actix responder wrapper writing a [`BidResponseState`] as JSON.
/// Always HTTP 200; zero bids is a valid auction outcome.
pub struct JsonBidResponseState(pub BidResponseState);

impl Responder for JsonBidResponseState {
    type Body = actix_web::body::BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse {
        let body = match serde_json::to_vec(&self.0.to_response()) {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed serializing bid response: {}", e);
                return HttpResponse::InternalServerError().finish();
            }
        };

        HttpResponse::Ok()
            .content_type(ContentType::json())
            .body(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nobid_reason_serializes_with_nbr() {
        let state = BidResponseState::NoBidReason {
            reqid: "abc".to_string(),
            nbr: 500,
            desc: Some("no partners".to_string()),
        };

        let res = state.to_response();
        assert_eq!(res.id, "abc");
        assert_eq!(res.nbr, Some(500));
        assert!(res.seatbid.is_empty());
    }
}
