use crate::app::lifecycle::context::StartupContext;
use crate::app::pipeline::auction::{AuctionContext, tasks};
use crate::child_span_info;
use crate::core::demand::client::DemandClient;
use crate::core::pipeline::{AsyncTask, Pipeline, PipelineBuilder};
use crate::core::privacy::PrivacyGate;
use anyhow::{Error, anyhow, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::Instrument;

/// Build the pipeline which handles one auction, which may be wrapped
/// by an upstream intake adapter, e.g. the slots or vast handlers.
fn build_rtb_pipeline(context: &StartupContext) -> Result<Pipeline<AuctionContext, Error>, Error> {
    let config = context.config.get().ok_or(anyhow!(
        "Config not set when configuring the auction pipeline"
    ))?;

    let resolver = context
        .resolver
        .get()
        .ok_or_else(|| anyhow!("Publisher resolver not set"))?;

    let currency = context
        .currency
        .get()
        .ok_or_else(|| anyhow!("Currency service not set"))?;

    let circuits = context
        .circuits
        .get()
        .ok_or_else(|| anyhow!("Circuit registry not set"))?;

    let adapters = match context.adapters.get() {
        Some(adapters) => adapters,
        None => bail!("No adapter registry?! Cant build auction pipeline"),
    };

    let gate = Arc::new(PrivacyGate::new(config.privacy.clone()));

    let demand_client =
        DemandClient::new().or_else(|e| bail!("Auction pipeline client failed: {}", e))?;

    let rtb_pipeline = PipelineBuilder::new()
        .with_async(Box::new(tasks::PublisherLookupTask::new(
            resolver.clone(),
            config.auction.allow_unregistered_publisher,
        )))
        .with_blocking(Box::new(tasks::ValidateRequestTask::new(
            config.auction.clone(),
            currency.base().to_string(),
        )))
        .with_blocking(Box::new(tasks::PrivacyGateTask::new(gate.clone())))
        .with_async(Box::new(tasks::PartnerMatchingTask::new(
            adapters.clone(),
            circuits.clone(),
            gate,
        )))
        .with_async(Box::new(tasks::PartnerCalloutsTask::new(demand_client)))
        .with_async(Box::new(tasks::BidValidationTask::new(
            currency.clone(),
            config.auction.require_adomain,
        )))
        .with_async(Box::new(tasks::SettlementTask::new(
            currency.base().to_string(),
        )))
        .build()
        .expect("Auction pipeline should have tasks");

    Ok(rtb_pipeline)
}

/// Builds the pipeline of final tasks which must always run regardless
/// of whether the full auction pipeline ran, e.g. even a rejected
/// request still produces its analytics record.
fn build_finalizers_pipeline(
    context: &StartupContext,
) -> Result<Option<Pipeline<AuctionContext, Error>>, Error> {
    let mut pipeline_builder = PipelineBuilder::new();

    let fanout = context
        .analytics
        .get()
        .ok_or_else(|| anyhow!("No analytics fanout set on context"))?;

    pipeline_builder.add_async(Box::new(tasks::RecordAnalyticsTask::new(fanout.clone())));

    Ok(pipeline_builder.build())
}

/// Represents the auction pipeline and the following finalizer tasks
/// which must always run, regardless of whether the auction completed
pub struct AuctionAndFinalizersPipelineTask {
    rtb_pipeline: Pipeline<AuctionContext, Error>,
    finalizers_pipeline: Option<Pipeline<AuctionContext, Error>>,
}

impl AuctionAndFinalizersPipelineTask {
    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        // Run the auction pipeline, which may or may not complete
        // entirely, e.g. the auction is blocked for bad request values
        let auction_pipeline_res = self.rtb_pipeline.run(context).await;

        if let Some(finalizers_pipeline) = &self.finalizers_pipeline {
            // Bail here if some finalizer fails; these are non
            // negotiable since they carry billing-adjacent records
            finalizers_pipeline.run(context).await?;
        }

        auction_pipeline_res
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for AuctionAndFinalizersPipelineTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("auction_pipeline");

        self.run0(context).instrument(span).await
    }
}

/// Builds the pipeline which every auction request flows through. The
/// intake handlers adapt their own wire shapes to a [`AuctionContext`]
/// and pass it through here.
pub fn build_auction_pipeline(
    context: &StartupContext,
) -> Result<Pipeline<AuctionContext, Error>, Error> {
    let rtb_pipeline = build_rtb_pipeline(context)?;
    let finalizers_pipeline_opt = build_finalizers_pipeline(context)?;

    let auction_pipeline = PipelineBuilder::new()
        .with_async(Box::new(AuctionAndFinalizersPipelineTask {
            rtb_pipeline,
            finalizers_pipeline: finalizers_pipeline_opt,
        }))
        .build()
        .expect("Auction pipeline should have had RTB tasks");

    Ok(auction_pipeline)
}
