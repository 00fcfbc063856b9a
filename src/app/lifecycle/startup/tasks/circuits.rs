use crate::app::lifecycle::context::StartupContext;
use crate::core::breaker::CircuitRegistry;
use crate::core::observability::metrics;
use crate::core::pipeline::BlockingTask;
use anyhow::Error;
use std::sync::Arc;
use tracing::info;

pub struct CircuitsTask;

impl BlockingTask<StartupContext, Error> for CircuitsTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context
            .config
            .get()
            .ok_or_else(|| anyhow::anyhow!("Config not loaded before circuit registry"))?;

        let registry = CircuitRegistry::with_transition_hook(
            config.circuit.clone(),
            Arc::new(|partner, _from, to| {
                metrics::CIRCUIT_TRANSITIONS
                    .with_label_values(&[partner, &to.to_string()])
                    .inc();
            }),
        );

        info!(
            "Circuit registry up (failure_threshold {}, open_timeout {:?})",
            config.circuit.failure_threshold, config.circuit.open_timeout
        );

        context
            .circuits
            .set(Arc::new(registry))
            .map_err(|_| anyhow::anyhow!("Circuit registry already set"))?;

        Ok(())
    }
}
