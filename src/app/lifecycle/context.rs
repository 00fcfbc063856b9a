use crate::app::config::HbxConfig;
use crate::app::pipeline::auction::AuctionContext;
use crate::core::adapters::registry::AdapterRegistry;
use crate::core::analytics::AnalyticsFanout;
use crate::core::breaker::CircuitRegistry;
use crate::core::currency::CurrencyService;
use crate::core::pipeline::Pipeline;
use crate::core::publishers::{PublisherResolver, PublisherStore};
use anyhow::Error;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// Everything the startup pipeline produces, filled slot by slot.
/// Later tasks read what earlier ones set; the server task consumes
/// nearly all of it.
#[derive(Default)]
pub struct StartupContext {
    pub config_path: PathBuf,
    pub config: OnceLock<Arc<HbxConfig>>,
    pub currency: OnceLock<Arc<CurrencyService>>,
    pub currency_worker: OnceLock<tokio::task::JoinHandle<()>>,
    pub circuits: OnceLock<Arc<CircuitRegistry>>,
    pub adapters: OnceLock<AdapterRegistry>,
    pub store: OnceLock<Arc<dyn PublisherStore>>,
    pub resolver: OnceLock<Arc<PublisherResolver>>,
    pub analytics: OnceLock<Arc<AnalyticsFanout>>,
    pub auction_pipeline: OnceLock<Arc<Pipeline<AuctionContext, Error>>>,
    pub server: OnceLock<actix_web::dev::ServerHandle>,
}

impl StartupContext {
    pub fn new(config_path: PathBuf) -> Self {
        StartupContext {
            config_path,
            ..Default::default()
        }
    }
}
