pub mod adapters;
pub mod analytics;
pub mod auction;
pub mod breaker;
pub mod currency;
pub mod demand;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod privacy;
pub mod publishers;
pub mod spec;
pub mod usersync;
pub mod validation;
pub mod vast;
