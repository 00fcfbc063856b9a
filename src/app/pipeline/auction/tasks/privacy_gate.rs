use crate::app::pipeline::auction::AuctionContext;
use crate::child_span_info;
use crate::core::pipeline::BlockingTask;
use crate::core::privacy::PrivacyGate;
use std::sync::Arc;
use tracing::debug;

/// Computes the request's privacy posture once; partner matching
/// consults it per partner.
pub struct PrivacyGateTask {
    gate: Arc<PrivacyGate>,
}

impl PrivacyGateTask {
    pub fn new(gate: Arc<PrivacyGate>) -> Self {
        Self { gate }
    }
}

impl BlockingTask<AuctionContext, anyhow::Error> for PrivacyGateTask {
    fn run(&self, context: &AuctionContext) -> Result<(), anyhow::Error> {
        let span = child_span_info!(
            "privacy_gate_task",
            regulation = tracing::field::Empty
        )
        .entered();

        let posture = self.gate.assess(&context.req.read());

        span.record("regulation", tracing::field::display(posture.regulation));
        debug!("Privacy regulation: {}", posture.regulation);

        context
            .posture
            .set(posture)
            .map_err(|_| anyhow::anyhow!("Privacy posture already assigned"))?;

        Ok(())
    }
}
