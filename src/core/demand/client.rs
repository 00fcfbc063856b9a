use crate::core::adapters::{OutboundCall, RawResponse};
use crate::core::models::partner::HttpProto;
use anyhow::anyhow;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode, redirect, retry};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// Shared outbound HTTP transport for partner callouts. One pooled
/// client per protocol flavor, created eagerly so a broken TLS or DNS
/// setup fails at startup instead of mid-auction.
pub struct DemandClient {
    h1_client: OnceLock<Client>,
    h2c_client: OnceLock<Client>,
    h2_client: OnceLock<Client>,
}

impl DemandClient {
    fn init_client(proto: HttpProto) -> Result<Client, anyhow::Error> {
        let mut client_builder = reqwest::ClientBuilder::new()
            .danger_accept_invalid_certs(true)
            .user_agent("hbx-exchange")
            .connect_timeout(Duration::from_secs(1))
            .pool_max_idle_per_host(128)
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .tcp_keepalive(Some(Duration::from_secs(20)))
            .retry(retry::never())
            .referer(false)
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(1))
            .tcp_nodelay(true)
            .deflate(true)
            .gzip(true)
            .hickory_dns(true);

        client_builder = match proto {
            HttpProto::Http1 => client_builder
                .http1_only()
                .http1_ignore_invalid_headers_in_responses(true),
            HttpProto::H2c => client_builder
                .http2_prior_knowledge()
                .http2_adaptive_window(true),
            HttpProto::Http2 => client_builder.http2_adaptive_window(true),
        };

        client_builder.build().map_err(anyhow::Error::from)
    }

    /// Create a new demand client which will eagerly create underlying
    /// http clients to afford graceful failure on startup
    pub fn new() -> Result<Self, anyhow::Error> {
        Ok(DemandClient {
            h1_client: OnceLock::from(Self::init_client(HttpProto::Http1)?),
            h2c_client: OnceLock::from(Self::init_client(HttpProto::H2c)?),
            h2_client: OnceLock::from(Self::init_client(HttpProto::Http2)?),
        })
    }

    /// Send one adapter-produced call under the remaining auction
    /// budget. A non-200 returns immediately without reading the body.
    ///
    /// # Behavior
    /// Returns an error only when the request could not be sent or the
    /// body could not be read; any completed HTTP exchange is Ok
    /// regardless of status code.
    pub async fn send(
        &self,
        proto: HttpProto,
        call: &OutboundCall,
        budget: Duration,
    ) -> Result<RawResponse, anyhow::Error> {
        let client = match proto {
            HttpProto::Http1 => self.h1_client.get(),
            HttpProto::H2c => self.h2c_client.get(),
            HttpProto::Http2 => self.h2_client.get(),
        }
        .expect("Client should never be missing");

        let mut headers = HeaderMap::new();
        for header in &call.headers {
            let key = HeaderName::from_static(header.key);
            let value = HeaderValue::from_str(&header.value)
                .map_err(|e| anyhow!("Invalid header value: {}", e))?;

            headers.insert(key, value);
        }

        let req = client
            .post(&call.url)
            .headers(headers)
            .body(call.body.clone())
            .timeout(budget)
            .build()
            .map_err(|e| anyhow!("Failed to build http request for {}: {}", call.url, e))?;

        let res = client
            .execute(req)
            .await
            .map_err(|e| anyhow!("Failed to execute http request for {}: {}", call.url, e))?;

        let status = res.status();
        let status_code = status.as_u16() as u32;

        if status != StatusCode::OK {
            debug!("Non 200 status {}, early exit", status_code);
            return Ok(RawResponse {
                status: status_code,
                body: Bytes::new(),
            });
        }

        let body = res
            .bytes()
            .await
            .map_err(|e| anyhow!("Failed to read http response for {}: {}", call.url, e))?;

        Ok(RawResponse {
            status: status_code,
            body,
        })
    }
}
