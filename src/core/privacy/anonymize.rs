//! Geo-anonymization of client addresses for regulated traffic.
//! IPv4 keeps /24 (last octet zeroed); IPv6 keeps /48.

use std::net::{Ipv4Addr, Ipv6Addr};

pub fn anonymize_ipv4(ip: &str) -> Option<String> {
    let addr: Ipv4Addr = ip.parse().ok()?;
    let octets = addr.octets();

    Some(Ipv4Addr::new(octets[0], octets[1], octets[2], 0).to_string())
}

pub fn anonymize_ipv6(ip: &str) -> Option<String> {
    let addr: Ipv6Addr = ip.parse().ok()?;
    let seg = addr.segments();

    Some(Ipv6Addr::new(seg[0], seg[1], seg[2], 0, 0, 0, 0, 0).to_string())
}
