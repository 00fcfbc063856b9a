use crate::core::breaker::BreakerConfig;
use crate::core::currency::CurrencyConfig;
use crate::core::models::partner::Partner;
use crate::core::models::publisher::Publisher;
use crate::core::privacy::PrivacyConfig;
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Intake cap; larger bodies answer 413
    pub max_body_bytes: usize,
    /// Global request rate limit, 0 disables
    pub rate_limit_qps: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            max_body_bytes: 10 * 1024 * 1024,
            rate_limit_qps: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionConfig {
    /// Deadline applied when the request carries no tmax
    pub tmax_default_ms: u64,
    /// Hard internal ceiling; the lower of this and the client tmax wins
    pub tmax_cap_ms: u64,
    /// Safety margin subtracted from the partner-facing deadline so the
    /// exchange has time to clear and respond
    pub deadline_margin_ms: u64,
    /// Reject bids without an advertiser domain
    pub require_adomain: bool,
    /// Dev only: unknown accounts get a synthetic open publisher
    pub allow_unregistered_publisher: bool,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            tmax_default_ms: 1000,
            tmax_cap_ms: 2500,
            deadline_margin_ms: 50,
            require_adomain: true,
            allow_unregistered_publisher: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishersConfig {
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,
    pub cache_capacity: u64,
    /// Publisher accounts served by the config-backed store
    pub entries: Vec<Publisher>,
}

impl Default for PublishersConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
            cache_capacity: 10_000,
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalyticsSinkConfig {
    Log,
    Http { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Per-sink bounded queue; full queues drop oldest
    pub queue_size: usize,
    #[serde(with = "humantime_serde")]
    pub flush_timeout: Duration,
    pub sinks: Vec<AnalyticsSinkConfig>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            queue_size: 1024,
            flush_timeout: Duration::from_secs(5),
            sinks: vec![AnalyticsSinkConfig::Log],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    Daily,
    Hourly,
    Never,
}

impl Default for FileRotation {
    fn default() -> Self {
        FileRotation::Daily
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSink {
    /// Whether spans should be exported to this sink
    pub spans: bool,
    /// The kind of observability sink
    pub dest: LogType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogType {
    Stdout {
        #[serde(default = "default_logtype_color")]
        color: bool,
        #[serde(default)]
        json: bool,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        json: bool,
        #[serde(default)]
        rotation: FileRotation,
        #[serde(default)]
        max_files: usize,
    },
}

fn default_logtype_color() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub span_sample_rate: f32,
    #[serde(default)]
    pub sinks: Vec<LogSink>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            span_sample_rate: 0.01,
            sinks: vec![LogSink {
                spans: true,
                dest: LogType::Stdout {
                    color: true,
                    json: false,
                },
            }],
        }
    }
}

impl LoggingConfig {
    /// Validates the logging configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.sinks.is_empty() {
            anyhow::bail!("At least one logging sink must be configured");
        }

        self.level.parse::<tracing::Level>().map_err(|_| {
            anyhow::anyhow!(
                "Invalid log level: '{}'. Valid levels: trace, debug, info, warn, error",
                self.level
            )
        })?;

        if !(0.0..=1.0).contains(&self.span_sample_rate) {
            anyhow::bail!(
                "span_sample_rate must be between 0.0 and 1.0, got {}",
                self.span_sample_rate
            );
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HbxConfig {
    pub server: ServerConfig,
    pub auction: AuctionConfig,
    pub currency: CurrencyConfig,
    pub privacy: PrivacyConfig,
    pub circuit: BreakerConfig,
    pub publishers: PublishersConfig,
    pub partners: Vec<Partner>,
    pub analytics: AnalyticsConfig,
    pub logging: LoggingConfig,
}

impl HbxConfig {
    pub fn load(path: &PathBuf) -> Result<HbxConfig, anyhow::Error> {
        let cfg = Config::builder()
            .add_source(config::File::from(path.to_path_buf()))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.logging.validate()?;

        if self.auction.tmax_cap_ms == 0 {
            anyhow::bail!("tmax_cap_ms must be positive");
        }

        if self.auction.tmax_default_ms > self.auction.tmax_cap_ms {
            anyhow::bail!("tmax_default_ms cannot exceed tmax_cap_ms");
        }

        if self.currency.base.len() != 3 {
            anyhow::bail!("default currency must be a 3-letter ISO code");
        }

        for partner in &self.partners {
            if partner.code.is_empty() || partner.endpoint.is_empty() {
                anyhow::bail!("Every partner needs a code and an endpoint");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = HbxConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.auction.tmax_cap_ms, 2500);
        assert_eq!(cfg.currency.base, "USD");
    }

    #[test]
    fn test_bad_tmax_rejected() {
        let mut cfg = HbxConfig::default();
        cfg.auction.tmax_default_ms = 5000;
        assert!(cfg.validate().is_err());
    }
}
