use crate::core::spec::openrtb::{BidRequest, BidResponse};
use anyhow::anyhow;
use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

pub struct Header {
    pub key: &'static str,
    pub value: String,
}

impl Header {
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

pub struct RequestEncoder {
    pub headers: Vec<Header>,
    pub data: Vec<u8>,
}

impl RequestEncoder {
    fn compress(data: Vec<u8>) -> Result<Vec<u8>, anyhow::Error> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(1024), Compression::fast());
        encoder.write_all(&data)?;

        Ok(encoder.finish()?)
    }

    /// Encodes the given request to a byte array and associates any
    /// required headers such as content type
    pub fn encode(req: &BidRequest, gzip: bool) -> Result<Self, anyhow::Error> {
        let mut headers = vec![
            Header::new("content-type", "application/json"),
            Header::new("x-openrtb-version", "2.5"),
        ];

        let mut data = serde_json::to_vec(req)?;

        if gzip {
            headers.push(Header::new("content-encoding", "gzip"));
            data = Self::compress(data)?;
        }

        Ok(Self { headers, data })
    }
}

pub struct ResponseDecoder;

impl ResponseDecoder {
    pub fn decode(data: &Bytes) -> Result<BidResponse, anyhow::Error> {
        serde_json::from_slice(data.as_ref())
            .map_err(|e| anyhow!("Failed decoding json response: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_gzip_round_trip() {
        let req = BidRequest {
            id: "r-1".to_string(),
            ..Default::default()
        };

        let encoded = RequestEncoder::encode(&req, true).unwrap();
        assert!(encoded
            .headers
            .iter()
            .any(|h| h.key == "content-encoding" && h.value == "gzip"));

        let mut decoder = GzDecoder::new(encoded.data.as_slice());
        let mut plain = Vec::new();
        decoder.read_to_end(&mut plain).unwrap();

        let back: BidRequest = serde_json::from_slice(&plain).unwrap();
        assert_eq!(back.id, "r-1");
    }

    #[test]
    fn test_decode_error_is_nonfatal_shape() {
        let err = ResponseDecoder::decode(&Bytes::from_static(b"<html>bad gateway</html>"));
        assert!(err.is_err());
    }
}
