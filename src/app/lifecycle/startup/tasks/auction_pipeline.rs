use crate::app::lifecycle::context::StartupContext;
use crate::app::pipeline::auction::pipeline::build_auction_pipeline;
use crate::core::pipeline::BlockingTask;
use anyhow::Error;
use std::sync::Arc;
use tracing::info;

pub struct AuctionPipelineTask;

impl BlockingTask<StartupContext, Error> for AuctionPipelineTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let pipeline = build_auction_pipeline(context)?;

        info!("Auction pipeline built");

        context
            .auction_pipeline
            .set(Arc::new(pipeline))
            .map_err(|_| anyhow::anyhow!("Auction pipeline already set"))?;

        Ok(())
    }
}
