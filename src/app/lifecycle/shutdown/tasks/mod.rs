pub mod flush_analytics;
pub mod stop_server;
