pub mod adapters_load;
pub mod analytics;
pub mod auction_pipeline;
pub mod circuits;
pub mod config_load;
pub mod currency;
pub mod observability;
pub mod publishers_load;
pub mod start_server;
