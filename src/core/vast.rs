//! Minimal VAST document assembly for the video endpoints. Per IAB
//! convention the HTTP layer always answers 200; failures travel inside
//! the document as an Error element.

use crate::core::models::auction::TypedBid;

const VAST_VERSION: &str = "4.0";

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A VAST body for one winning video bid. Partner markup that is
/// already a VAST document passes through untouched; a bid carrying
/// only a notice URL becomes a Wrapper pointing at it.
pub fn for_winner(bid: &TypedBid) -> Option<String> {
    let adm = bid.adm.trim();

    if adm.contains("<VAST") {
        return Some(adm.to_string());
    }

    if !bid.nurl.is_empty() {
        return Some(format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<VAST version="{version}">"#,
                r#"<Ad id="{id}"><Wrapper>"#,
                r#"<AdSystem>hbx</AdSystem>"#,
                r#"<VASTAdTagURI><![CDATA[{nurl}]]></VASTAdTagURI>"#,
                r#"</Wrapper></Ad></VAST>"#
            ),
            version = VAST_VERSION,
            id = escape(&bid.creative_id),
            nurl = bid.nurl,
        ));
    }

    None
}

/// An empty VAST carrying a URL-encoded error message. Served with
/// HTTP 200 regardless of what went wrong.
pub fn error_document(message: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<VAST version="{version}">"#,
            r#"<Error><![CDATA[https://errors.hbx.invalid/vast?msg={msg}]]></Error>"#,
            r#"</VAST>"#
        ),
        version = VAST_VERSION,
        msg = urlencoding::encode(message),
    )
}
