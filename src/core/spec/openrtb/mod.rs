//! OpenRTB 2.5/2.6 wire model, request and response halves. Strings are
//! empty-string defaulted rather than optional to match the wire's
//! omitted-field convention; nested objects stay `Option`.

mod bid_request;
mod bid_response;

pub use bid_request::*;
pub use bid_response::*;

/// AdCOM device types we bucket on.
pub mod devicetype {
    pub const MOBILE_TABLET_GENERAL: i32 = 1;
    pub const PERSONAL_COMPUTER: i32 = 2;
    pub const CONNECTED_TV: i32 = 3;
    pub const PHONE: i32 = 4;
    pub const TABLET: i32 = 5;
    pub const CONNECTED_DEVICE: i32 = 6;
    pub const SET_TOP_BOX: i32 = 7;
    pub const OOH_DEVICE: i32 = 8;
}
