use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::startup::tasks::adapters_load::AdaptersLoadTask;
use crate::app::lifecycle::startup::tasks::analytics::AnalyticsTask;
use crate::app::lifecycle::startup::tasks::auction_pipeline::AuctionPipelineTask;
use crate::app::lifecycle::startup::tasks::circuits::CircuitsTask;
use crate::app::lifecycle::startup::tasks::config_load::ConfigLoadTask;
use crate::app::lifecycle::startup::tasks::currency::CurrencyTask;
use crate::app::lifecycle::startup::tasks::observability::ConfigureObservabilityTask;
use crate::app::lifecycle::startup::tasks::publishers_load::PublishersLoadTask;
use crate::app::lifecycle::startup::tasks::start_server::StartServerTask;
use crate::app::span::WrappedPipelineTask;
use crate::core::pipeline::{Pipeline, PipelineBuilder};
use tracing::{Span, info_span};

/// Builds the graceful ordering of startup tasks required for a
/// successful startup. Configures logging, builds the auction
/// pipeline, all that good stuff
pub fn build_start_pipeline() -> Pipeline<StartupContext, anyhow::Error> {
    // config and observability come up first so everything after
    // can log properly
    let boot_loader = PipelineBuilder::new()
        .with_blocking(Box::new(ConfigLoadTask))
        .with_blocking(Box::new(ConfigureObservabilityTask))
        .build()
        .expect("Bootloader should have tasks!");

    // now logging is configured, we can start our span. if done
    // earlier it would be dropped
    let start_pipeline = PipelineBuilder::new()
        .with_async(Box::new(CurrencyTask))
        .with_blocking(Box::new(CircuitsTask))
        .with_blocking(Box::new(AdaptersLoadTask))
        .with_blocking(Box::new(PublishersLoadTask))
        .with_async(Box::new(AnalyticsTask))
        .with_blocking(Box::new(AuctionPipelineTask))
        .with_async(Box::new(StartServerTask))
        .build()
        .expect("Startup pipeline should have tasks!");

    let nop_bootloader_pipeline = WrappedPipelineTask::new(boot_loader, || Span::none());

    let observed_startup_pipeline =
        WrappedPipelineTask::new(start_pipeline, || info_span!("start_pipeline"));

    PipelineBuilder::new()
        .with_async(Box::new(nop_bootloader_pipeline))
        .with_async(Box::new(observed_startup_pipeline))
        .build()
        .expect("Pipeline should have tasks!")
}
