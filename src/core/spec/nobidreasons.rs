//! OpenRTB `nbr` values the exchange emits. Codes below 500 are the
//! standard IAB list; 500+ are exchange specific.

pub mod openrtb {
    crate::spec_list! {
        UNKNOWN_ERROR = 0 => "Unknown Error",
        TECHNICAL_ERROR = 1 => "Technical Error",
        INVALID_REQUEST = 2 => "Invalid Request",
        BLOCKED_PUBLISHER = 6 => "Blocked Publisher or Site",
        UNMATCHED_USER = 10 => "Unmatched User",
        INSUFFICIENT_AUCTION_TIME = 102 => "Insufficient Auction Time",
    }
}

crate::spec_list! {
    /// No partners survived selection and privacy filtering
    NO_BIDDERS_ELIGIBLE = 500 => "No Bidders Eligible",
    /// Partners were called but none returned a usable bid
    NO_BIDS_RECEIVED = 501 => "No Bids Received",
    /// The publisher account is unrecognized
    UNKNOWN_PUBLISHER = 502 => "Unknown Publisher",
    /// The publisher account is paused or archived
    PUBLISHER_SUSPENDED = 503 => "Publisher Suspended",
    /// The request domain is not in the publisher allow list
    UNAUTHORIZED_DOMAIN = 504 => "Unauthorized Domain",
    /// Every selected partner timed out before the deadline
    ALL_TIMED_OUT = 505 => "All Partners Timed Out",
}
