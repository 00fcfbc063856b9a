//! Exchange currency service. Holds an ISO-code -> rate table quoted
//! against a fixed base and refreshes it on an interval from an external
//! rates document. Readers convert against an atomically swapped table
//! and never observe a partial update.

use anyhow::{Context, anyhow};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    /// Rates document URL; empty disables the refresh worker (dev
    /// setups rely on `static_rates` instead)
    pub rates_url: String,
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    /// Age after which the table is reported stale on readiness.
    /// Conversion continues on stale rates.
    #[serde(with = "humantime_serde")]
    pub stale_after: Duration,
    /// Fixed conversion base, also the exchange default currency
    pub base: String,
    /// Optional fixed table for dev and tests
    pub static_rates: HashMap<String, f64>,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            rates_url: String::new(),
            refresh_interval: Duration::from_secs(30 * 60),
            stale_after: Duration::from_secs(24 * 60 * 60),
            base: "USD".to_string(),
            static_rates: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConvertError {
    /// No successful refresh yet; nothing to convert against
    NotInitialized,
    UnknownCurrency(String),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::NotInitialized => write!(f, "currency table not initialized"),
            ConvertError::UnknownCurrency(code) => write!(f, "unknown currency {}", code),
        }
    }
}

impl std::error::Error for ConvertError {}

/// Wire shape of the external rates document.
#[derive(Debug, Deserialize)]
struct RatesDocument {
    base: String,
    rates: HashMap<String, f64>,
}

struct RateTable {
    /// Units of currency per one base unit
    rates: HashMap<String, f64>,
    fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrencyStats {
    pub base: String,
    pub currencies: usize,
    pub initialized: bool,
    pub stale: bool,
    pub fetched_at: Option<DateTime<Utc>>,
}

pub struct CurrencyService {
    cfg: CurrencyConfig,
    table: ArcSwap<RateTable>,
    http: reqwest::Client,
}

impl CurrencyService {
    pub fn new(cfg: CurrencyConfig) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed building currency http client")?;

        let initial = if cfg.static_rates.is_empty() {
            RateTable {
                rates: HashMap::new(),
                fetched_at: None,
            }
        } else {
            RateTable {
                rates: cfg.static_rates.clone(),
                fetched_at: Some(Utc::now()),
            }
        };

        Ok(CurrencyService {
            cfg,
            table: ArcSwap::from_pointee(initial),
            http,
        })
    }

    pub fn base(&self) -> &str {
        &self.cfg.base
    }

    /// Converts an amount between ISO codes. Same-currency conversion
    /// is exact and never consults the table, so it works before the
    /// first refresh.
    pub fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, ConvertError> {
        if from == to {
            return Ok(amount);
        }

        let table = self.table.load();

        if table.fetched_at.is_none() {
            return Err(ConvertError::NotInitialized);
        }

        let in_base = amount / self.rate(&table, from)?;
        Ok(in_base * self.rate(&table, to)?)
    }

    fn rate(&self, table: &RateTable, code: &str) -> Result<f64, ConvertError> {
        if code == self.cfg.base {
            return Ok(1.0);
        }

        match table.rates.get(code) {
            Some(rate) if *rate > 0.0 => Ok(*rate),
            _ => Err(ConvertError::UnknownCurrency(code.to_string())),
        }
    }

    pub fn initialized(&self) -> bool {
        self.table.load().fetched_at.is_some()
    }

    pub fn is_stale(&self) -> bool {
        match self.table.load().fetched_at {
            Some(at) => {
                let age = Utc::now().signed_duration_since(at);
                age.num_seconds() as u64 >= self.cfg.stale_after.as_secs()
            }
            None => true,
        }
    }

    pub fn stats(&self) -> CurrencyStats {
        let table = self.table.load();

        CurrencyStats {
            base: self.cfg.base.clone(),
            currencies: table.rates.len(),
            initialized: table.fetched_at.is_some(),
            stale: self.is_stale(),
            fetched_at: table.fetched_at,
        }
    }

    /// One fetch-and-swap cycle. Failures leave the previous table in
    /// place; auctions keep converting with last-known rates.
    pub async fn refresh_once(&self) -> Result<(), anyhow::Error> {
        if self.cfg.rates_url.is_empty() {
            return Err(anyhow!("No rates_url configured"));
        }

        let body = self
            .http
            .get(&self.cfg.rates_url)
            .send()
            .await
            .context("Rates fetch failed")?
            .error_for_status()
            .context("Rates fetch returned error status")?
            .bytes()
            .await
            .context("Rates body read failed")?;

        let doc: RatesDocument =
            serde_json::from_slice(&body).context("Rates document decode failed")?;

        if doc.base != self.cfg.base {
            return Err(anyhow!(
                "Rates document base {} does not match configured base {}",
                doc.base,
                self.cfg.base
            ));
        }

        let count = doc.rates.len();
        self.table.store(Arc::new(RateTable {
            rates: doc.rates,
            fetched_at: Some(Utc::now()),
        }));

        debug!("Loaded {} currency rates", count);
        Ok(())
    }

    /// Background refresh loop. Startup does not wait on the first
    /// fetch; until one succeeds, convert returns NotInitialized and
    /// the coordinator flags affected bids.
    pub fn spawn_refresh(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if self.cfg.rates_url.is_empty() {
            if !self.initialized() {
                warn!("Currency service has no rates_url and no static rates");
            }
            return None;
        }

        let service = self;

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(service.cfg.refresh_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                match service.refresh_once().await {
                    Ok(_) => info!("Currency rates refreshed"),
                    Err(e) => warn!("Currency refresh failed: {:#}", e),
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_with(rates: &[(&str, f64)]) -> CurrencyService {
        let cfg = CurrencyConfig {
            static_rates: rates.iter().map(|(c, r)| (c.to_string(), *r)).collect(),
            ..Default::default()
        };

        CurrencyService::new(cfg).unwrap()
    }

    #[test]
    fn test_same_currency_is_exact() {
        let service = CurrencyService::new(CurrencyConfig::default()).unwrap();

        // exact even before initialization
        assert_eq!(service.convert(2.5, "EUR", "EUR").unwrap(), 2.5);
    }

    #[test]
    fn test_converts_through_base() {
        // EUR rate 0.9259.. per USD means 1 EUR = 1.08 USD
        let service = service_with(&[("EUR", 1.0 / 1.08), ("JPY", 150.0)]);

        let usd = service.convert(2.0, "EUR", "USD").unwrap();
        assert!((usd - 2.16).abs() < 1e-9);

        let jpy = service.convert(1.0, "USD", "JPY").unwrap();
        assert!((jpy - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_currency_errors() {
        let service = service_with(&[("EUR", 0.9)]);

        assert_eq!(
            service.convert(1.0, "XXX", "USD"),
            Err(ConvertError::UnknownCurrency("XXX".to_string()))
        );
    }

    #[test]
    fn test_uninitialized_errors_but_reports() {
        let service = CurrencyService::new(CurrencyConfig::default()).unwrap();

        assert_eq!(
            service.convert(1.0, "EUR", "USD"),
            Err(ConvertError::NotInitialized)
        );
        assert!(!service.initialized());
        assert!(service.is_stale());
    }

    #[test]
    fn test_static_rates_initialize() {
        let service = service_with(&[("EUR", 0.9)]);
        assert!(service.initialized());
        assert!(!service.is_stale());
        assert_eq!(service.stats().currencies, 1);
    }
}
