//! TCF v2 core-string decoding. Only the fields the gate consults are
//! materialized: purposes consent and vendor consent. Anything malformed
//! parses to an error, which the gate treats as consent for nobody.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::collections::HashSet;
use std::fmt;

const PURPOSES_CONSENT_OFFSET: usize = 152;
const PURPOSES_CONSENT_BITS: u32 = 24;
// PurposesLITransparency(24) + PurposeOneTreatment(1) + PublisherCC(12)
const POST_PURPOSES_SKIP: u32 = 37;

#[derive(Debug, Clone, PartialEq)]
pub enum TcfError {
    InvalidBase64,
    UnsupportedVersion(u8),
    Truncated,
    InvalidRange,
}

impl fmt::Display for TcfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TcfError::InvalidBase64 => write!(f, "consent string is not valid base64url"),
            TcfError::UnsupportedVersion(v) => write!(f, "unsupported tcf version {}", v),
            TcfError::Truncated => write!(f, "consent string truncated"),
            TcfError::InvalidRange => write!(f, "invalid vendor range entry"),
        }
    }
}

impl std::error::Error for TcfError {}

struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        BitReader { bytes, pos: 0 }
    }

    fn read(&mut self, bits: u32) -> Result<u64, TcfError> {
        let mut out: u64 = 0;

        for _ in 0..bits {
            let byte = self.pos / 8;
            if byte >= self.bytes.len() {
                return Err(TcfError::Truncated);
            }

            let bit = (self.bytes[byte] >> (7 - (self.pos % 8))) & 1;
            out = (out << 1) | bit as u64;
            self.pos += 1;
        }

        Ok(out)
    }

    fn skip_to(&mut self, pos: usize) -> Result<(), TcfError> {
        if pos < self.pos || pos > self.bytes.len() * 8 {
            return Err(TcfError::Truncated);
        }

        self.pos = pos;
        Ok(())
    }
}

/// Decoded consent state from a TCF v2 core segment.
#[derive(Debug, Clone)]
pub struct TcfConsent {
    /// Bit i set = purpose i+1 consented
    purposes: u32,
    max_vendor_id: u16,
    vendors: HashSet<u16>,
}

impl TcfConsent {
    pub fn parse(consent: &str) -> Result<TcfConsent, TcfError> {
        // disclosed-vendors / publisher-tc segments are not consulted
        let core = consent.split('.').next().unwrap_or("").trim_end_matches('=');

        let bytes = URL_SAFE_NO_PAD
            .decode(core)
            .map_err(|_| TcfError::InvalidBase64)?;

        let mut reader = BitReader::new(&bytes);

        let version = reader.read(6)? as u8;
        if version != 2 {
            return Err(TcfError::UnsupportedVersion(version));
        }

        reader.skip_to(PURPOSES_CONSENT_OFFSET)?;
        let purposes = reader.read(PURPOSES_CONSENT_BITS)? as u32;

        reader.read(POST_PURPOSES_SKIP as u32)?;

        let max_vendor_id = reader.read(16)? as u16;
        let is_range_encoding = reader.read(1)? == 1;

        let mut vendors = HashSet::new();

        if is_range_encoding {
            let num_entries = reader.read(12)?;

            for _ in 0..num_entries {
                let is_a_range = reader.read(1)? == 1;
                let start = reader.read(16)? as u16;
                let end = if is_a_range { reader.read(16)? as u16 } else { start };

                if start == 0 || end < start || end > max_vendor_id {
                    return Err(TcfError::InvalidRange);
                }

                vendors.extend(start..=end);
            }
        } else {
            for id in 1..=max_vendor_id {
                if reader.read(1)? == 1 {
                    vendors.insert(id);
                }
            }
        }

        Ok(TcfConsent {
            purposes,
            max_vendor_id,
            vendors,
        })
    }

    /// Purpose ids are 1-based per the TCF policy list.
    pub fn purpose(&self, id: u8) -> bool {
        if id == 0 || id as u32 > PURPOSES_CONSENT_BITS {
            return false;
        }

        self.purposes & (1 << (PURPOSES_CONSENT_BITS - id as u32)) != 0
    }

    pub fn vendor(&self, id: u16) -> bool {
        id != 0 && id <= self.max_vendor_id && self.vendors.contains(&id)
    }
}

/// Consent-string builders shared by privacy tests.
#[cfg(test)]
pub mod test_strings {
    use super::*;

    /// Packs fields MSB-first, mirroring the TCF bit layout.
    struct BitWriter {
        bits: Vec<bool>,
    }

    impl BitWriter {
        fn new() -> Self {
            BitWriter { bits: Vec::new() }
        }

        fn push(&mut self, value: u64, bits: u32) {
            for i in (0..bits).rev() {
                self.bits.push(i < 64 && (value >> i) & 1 == 1);
            }
        }

        fn encode(&self) -> String {
            let mut bytes = vec![0u8; self.bits.len().div_ceil(8)];

            for (i, bit) in self.bits.iter().enumerate() {
                if *bit {
                    bytes[i / 8] |= 1 << (7 - (i % 8));
                }
            }

            URL_SAFE_NO_PAD.encode(bytes)
        }
    }

    fn core_prefix(purposes: &[u8]) -> BitWriter {
        let mut w = BitWriter::new();
        w.push(2, 6); // version
        w.push(0, 146); // created .. special feature opt-ins

        let mut mask: u32 = 0;
        for p in purposes {
            mask |= 1 << (24 - *p as u32);
        }
        w.push(mask as u64, 24); // purposes consent

        w.push(0, 37); // LI transparency, purpose-one treatment, publisher cc
        w
    }

    pub fn bitfield(purposes: &[u8], max_vendor: u16, vendors: &[u16]) -> String {
        let mut w = core_prefix(purposes);
        w.push(max_vendor as u64, 16);
        w.push(0, 1); // bitfield encoding

        for id in 1..=max_vendor {
            w.push(vendors.contains(&id) as u64, 1);
        }

        w.encode()
    }

    pub fn range(purposes: &[u8], max_vendor: u16, ranges: &[(u16, u16)]) -> String {
        let mut w = core_prefix(purposes);
        w.push(max_vendor as u64, 16);
        w.push(1, 1); // range encoding
        w.push(ranges.len() as u64, 12);

        for (start, end) in ranges {
            if start == end {
                w.push(0, 1);
                w.push(*start as u64, 16);
            } else {
                w.push(1, 1);
                w.push(*start as u64, 16);
                w.push(*end as u64, 16);
            }
        }

        w.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::test_strings::{bitfield, range};
    use super::*;

    #[test]
    fn test_bitfield_vendor_and_purposes() {
        let s = bitfield(&[1, 3, 4], 60, &[52]);
        let consent = TcfConsent::parse(&s).unwrap();

        assert!(consent.purpose(1));
        assert!(!consent.purpose(2));
        assert!(consent.purpose(3));
        assert!(consent.purpose(4));

        assert!(consent.vendor(52));
        assert!(!consent.vendor(76));
        assert!(!consent.vendor(0));
        assert!(!consent.vendor(61));
    }

    #[test]
    fn test_range_encoded_vendors() {
        let s = range(&[1], 200, &[(10, 20), (52, 52)]);
        let consent = TcfConsent::parse(&s).unwrap();

        assert!(consent.vendor(10));
        assert!(consent.vendor(15));
        assert!(consent.vendor(20));
        assert!(!consent.vendor(21));
        assert!(consent.vendor(52));
        assert!(!consent.vendor(53));
    }

    #[test]
    fn test_extra_segments_ignored() {
        let s = format!("{}.IBAgAA", bitfield(&[1], 10, &[2]));
        let consent = TcfConsent::parse(&s).unwrap();

        assert!(consent.vendor(2));
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(
            TcfConsent::parse("!!notb64!!").unwrap_err(),
            TcfError::InvalidBase64
        );
        assert!(matches!(
            TcfConsent::parse("BAAA"),
            Err(TcfError::UnsupportedVersion(_)) | Err(TcfError::Truncated)
        ));
    }

    #[test]
    fn test_truncated_string_rejected() {
        let full = bitfield(&[1], 60, &[52]);
        let cut = &full[..10];

        assert!(TcfConsent::parse(cut).is_err());
    }

    #[test]
    fn test_invalid_range_rejected() {
        // end beyond max vendor id
        let s = range(&[1], 10, &[(5, 50)]);
        assert_eq!(TcfConsent::parse(&s).unwrap_err(), TcfError::InvalidRange);
    }
}
