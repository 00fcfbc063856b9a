use crate::app::pipeline::auction::AuctionContext;
use crate::app::pipeline::auction::context::PartnerContext;
use crate::child_span_info;
use crate::core::adapters::PartnerAdapter;
use crate::core::adapters::registry::AdapterRegistry;
use crate::core::breaker::CircuitRegistry;
use crate::core::models::auction::ExclusionReason;
use crate::core::models::publisher::{DeviceClass, Publisher};
use crate::core::pipeline::AsyncTask;
use crate::core::privacy::{PrivacyGate, gate};
use crate::core::spec::nobidreasons;
use crate::core::spec::openrtb::{BidRequest, devicetype};
use crate::core::spec::response_state::BidResponseState;
use anyhow::{Error, anyhow, bail};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{Instrument, Span, debug};

/// Builds the set of partners this auction will actually call: slot
/// parameters attached, capabilities and privacy checked, circuit
/// probed last. Excluded partners are recorded with their reason and
/// never dispatched.
pub struct PartnerMatchingTask {
    registry: AdapterRegistry,
    circuits: Arc<CircuitRegistry>,
    gate: Arc<PrivacyGate>,
}

fn device_class(req: &BidRequest) -> DeviceClass {
    let devicetype = req.device.as_ref().map(|d| d.devicetype).unwrap_or(0);

    match devicetype {
        devicetype::MOBILE_TABLET_GENERAL | devicetype::PHONE | devicetype::TABLET => {
            DeviceClass::Mobile
        }
        devicetype::PERSONAL_COMPUTER => DeviceClass::Desktop,
        _ => DeviceClass::All,
    }
}

impl PartnerMatchingTask {
    pub fn new(
        registry: AdapterRegistry,
        circuits: Arc<CircuitRegistry>,
        gate: Arc<PrivacyGate>,
    ) -> Self {
        Self {
            registry,
            circuits,
            gate,
        }
    }

    fn supports_request(adapter: &dyn PartnerAdapter, req: &BidRequest) -> Result<(), ExclusionReason> {
        let caps = &adapter.partner().capabilities;

        if (req.site.is_some() && !caps.site) || (req.app.is_some() && !caps.app) {
            return Err(ExclusionReason::ChannelUnsupported);
        }

        let any_media = req.imp.iter().any(|imp| {
            (imp.banner.is_some() && caps.banner)
                || (imp.video.is_some() && caps.video)
                || (imp.native.is_some() && caps.native)
                || (imp.audio.is_some() && caps.audio)
        });

        if !any_media {
            return Err(ExclusionReason::MediaTypeUnsupported);
        }

        Ok(())
    }

    /// Attaches the partner's per-slot parameter blob under
    /// `imp.ext[code]` for every imp that has one, from the request
    /// itself or the publisher slot config. Returns how many imps
    /// ended up parameterized.
    fn attach_params(
        partner_req: &mut BidRequest,
        publisher: &Publisher,
        code: &str,
        device: DeviceClass,
    ) -> usize {
        let inventory_domain = partner_req
            .inventory_domain()
            .map(|d| d.to_string())
            .unwrap_or_default();

        let mut parameterized = 0;

        for imp in partner_req.imp.iter_mut() {
            let already = imp
                .ext
                .as_ref()
                .map(|ext| ext.get(code).is_some())
                .unwrap_or(false);

            if already {
                parameterized += 1;
                continue;
            }

            let unit = if imp.tagid.is_empty() {
                inventory_domain.as_str()
            } else {
                imp.tagid.as_str()
            };

            let Some(params) = publisher
                .find_slot(unit)
                .and_then(|slot| slot.partner_params(code, device))
            else {
                continue;
            };

            match imp.ext.as_mut().and_then(|ext| ext.as_object_mut()) {
                Some(map) => {
                    map.insert(code.to_string(), params.clone());
                }
                None => {
                    imp.ext = Some(json!({ code: params.clone() }));
                }
            }

            parameterized += 1;
        }

        parameterized
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = Span::current();

        let publisher = context
            .publisher
            .get()
            .ok_or_else(|| anyhow!("No publisher on context during matching"))?;
        let posture = context
            .posture
            .get()
            .ok_or_else(|| anyhow!("No privacy posture on context during matching"))?;

        let mut adapters = self.registry.all();
        adapters.sort_by(|a, b| a.partner().code.cmp(&b.partner().code));

        let device = device_class(&context.req.read());
        let mut selected = Vec::with_capacity(adapters.len());

        for adapter in adapters {
            let partner = adapter.partner();
            let code = partner.code.clone();

            {
                let req = context.req.read();
                if let Err(reason) = Self::supports_request(adapter.as_ref(), &req) {
                    context.exclude(&code, reason);
                    continue;
                }
            }

            let obligations = match self.gate.partner_decision(posture, partner) {
                Ok(obligations) => obligations,
                Err(reason) => {
                    context.exclude(&code, reason);
                    continue;
                }
            };

            let mut partner_req = context.req.read().clone();

            if Self::attach_params(&mut partner_req, publisher, &code, device) == 0 {
                context.exclude(&code, ExclusionReason::NoSlotParams);
                continue;
            }

            gate::apply_obligations(&mut partner_req, obligations);

            // circuit is the final gate so an open breaker is charged a
            // rejection only for partners that would otherwise be called
            let circuit = self.circuits.get(&code);
            if circuit.try_acquire().is_err() {
                context.exclude(&code, ExclusionReason::CircuitBreakerOpen);
                continue;
            }

            selected.push(PartnerContext {
                partner: Arc::new(partner.clone()),
                adapter: adapter.clone(),
                circuit,
                req: partner_req,
                outcome: std::sync::OnceLock::new(),
                bids: std::sync::OnceLock::new(),
            });
        }

        span.record("partners_selected", selected.len());
        span.record("partners_excluded", context.exclusions.lock().len());

        if selected.is_empty() {
            let brs = BidResponseState::NoBidReason {
                reqid: context.original_auction_id.clone(),
                nbr: nobidreasons::NO_BIDDERS_ELIGIBLE,
                desc: Some("No partners eligible".to_string()),
            };

            context
                .res
                .set(brs)
                .map_err(|_| anyhow!("Response state already assigned during matching"))?;

            bail!("No eligible partners for auction");
        }

        debug!("Selected {} partners", selected.len());
        *context.partners.lock().await = selected;

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for PartnerMatchingTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!(
            "partner_matching_task",
            partners_selected = tracing::field::Empty,
            partners_excluded = tracing::field::Empty
        );

        self.run0(context).instrument(span).await
    }
}
