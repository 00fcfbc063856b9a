use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::shutdown::tasks::flush_analytics::FlushAnalyticsTask;
use crate::app::lifecycle::shutdown::tasks::stop_server::StopServerTask;
use crate::core::pipeline::{Pipeline, PipelineBuilder};

/// Builds the shutdown pipeline, which takes the resulting `StartupContext`
/// which is responsible for attaching anything which may need shutdown
pub fn build_shutdown_pipeline() -> Pipeline<StartupContext, anyhow::Error> {
    PipelineBuilder::new()
        .with_async(Box::new(StopServerTask))
        .with_async(Box::new(FlushAnalyticsTask))
        .build()
        .expect("Shutdown pipeline should have tasks!")
}
