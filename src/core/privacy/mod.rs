//! Privacy gate: converts raw regulation signals into per-partner
//! allow/deny decisions plus outbound data obligations.

pub mod anonymize;
pub mod gate;
pub mod regulation;
pub mod tcf;
pub mod usprivacy;

pub use gate::{Obligations, PrivacyConfig, PrivacyGate, PrivacyPosture};
pub use regulation::Regulation;
