use crate::app::pipeline::auction::AuctionContext;
use crate::app::pipeline::auction::context::RequestReject;
use crate::child_span_info;
use crate::core::models::publisher::{Publisher, PublisherStatus};
use crate::core::pipeline::AsyncTask;
use crate::core::publishers::{PublisherResolver, ResolveError};
use crate::core::spec::nobidreasons;
use crate::core::spec::response_state::BidResponseState;
use anyhow::{Error, anyhow, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Instrument, debug, warn};

/// Resolves and authorizes the publisher account. Anything failing
/// here is a permission error to the caller; no partner is ever
/// contacted for an unresolved account.
pub struct PublisherLookupTask {
    resolver: Arc<PublisherResolver>,
    allow_unregistered: bool,
}

impl PublisherLookupTask {
    pub fn new(resolver: Arc<PublisherResolver>, allow_unregistered: bool) -> Self {
        Self {
            resolver,
            allow_unregistered,
        }
    }

    fn reject(
        &self,
        context: &AuctionContext,
        reject: RequestReject,
        nbr: u32,
        message: &str,
    ) -> Result<(), Error> {
        context
            .res
            .set(BidResponseState::NoBidReason {
                reqid: context.original_auction_id.clone(),
                nbr,
                desc: Some(message.to_string()),
            })
            .map_err(|_| anyhow!("Response state already assigned during lookup"))?;

        context
            .reject
            .set(reject)
            .map_err(|_| anyhow!("Reject already assigned during lookup"))?;

        bail!("{}", message);
    }

    fn synthetic_publisher(&self, account_id: &str) -> Publisher {
        warn!(
            "Serving unregistered publisher {} (allow_unregistered_publisher on)",
            account_id
        );

        Publisher {
            id: account_id.to_string(),
            name: format!("unregistered-{}", account_id),
            status: PublisherStatus::Active,
            bid_multiplier: 1.0,
            ..Default::default()
        }
        .normalized()
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        if context.account_id.is_empty() {
            return self.reject(
                context,
                RequestReject::UnknownPublisher,
                nobidreasons::UNKNOWN_PUBLISHER,
                "Missing account id",
            );
        }

        let domain = context.req.read().inventory_domain().map(|d| d.to_string());

        let publisher = match self
            .resolver
            .get(&context.account_id, domain.as_deref())
            .await
        {
            Ok(publisher) => publisher,
            Err(ResolveError::NotFound) if self.allow_unregistered => {
                Arc::new(self.synthetic_publisher(&context.account_id))
            }
            Err(ResolveError::NotFound) => {
                return self.reject(
                    context,
                    RequestReject::UnknownPublisher,
                    nobidreasons::UNKNOWN_PUBLISHER,
                    "Unknown publisher account",
                );
            }
            Err(ResolveError::UnauthorizedDomain) => {
                return self.reject(
                    context,
                    RequestReject::UnauthorizedDomain,
                    nobidreasons::UNAUTHORIZED_DOMAIN,
                    "Domain not allowed for publisher",
                );
            }
            Err(ResolveError::Store(e)) => {
                warn!("Publisher store failure: {:#}", e);
                return self.reject(
                    context,
                    RequestReject::Internal("publisher store unavailable".to_string()),
                    nobidreasons::openrtb::TECHNICAL_ERROR,
                    "Publisher store unavailable",
                );
            }
        };

        if publisher.status != PublisherStatus::Active {
            return self.reject(
                context,
                RequestReject::PublisherSuspended,
                nobidreasons::PUBLISHER_SUSPENDED,
                "Publisher is not active",
            );
        }

        debug!("Resolved publisher {}", publisher.id);

        context
            .publisher
            .set(publisher)
            .map_err(|_| anyhow!("Publisher already assigned on context"))?;

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for PublisherLookupTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("publisher_lookup_task");

        self.run0(context).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::publishers::ConfigPublisherStore;
    use crate::core::spec::openrtb::{BidRequest, Site};
    use std::time::Duration;

    fn resolver(publishers: Vec<Publisher>) -> Arc<PublisherResolver> {
        Arc::new(PublisherResolver::new(
            Arc::new(ConfigPublisherStore::new(publishers)),
            None,
            Duration::from_secs(30),
            100,
        ))
    }

    fn ctx(account: &str, domain: &str) -> AuctionContext {
        AuctionContext::new(
            "/openrtb2/auction".to_string(),
            account.to_string(),
            BidRequest {
                id: "r-1".to_string(),
                site: Some(Site {
                    domain: domain.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
    }

    fn active(id: &str) -> Publisher {
        Publisher {
            id: id.to_string(),
            status: PublisherStatus::Active,
            allowed_domains: vec!["example.com".to_string()],
            bid_multiplier: 1.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_active_publisher_resolves() {
        let task = PublisherLookupTask::new(resolver(vec![active("p-A")]), false);
        let context = ctx("p-A", "example.com");

        task.run0(&context).await.unwrap();
        assert_eq!(context.publisher.get().unwrap().id, "p-A");
    }

    #[tokio::test]
    async fn test_unknown_publisher_rejects() {
        let task = PublisherLookupTask::new(resolver(vec![]), false);
        let context = ctx("ghost", "example.com");

        assert!(task.run0(&context).await.is_err());
        assert!(matches!(
            context.reject.get(),
            Some(RequestReject::UnknownPublisher)
        ));
    }

    #[tokio::test]
    async fn test_unknown_publisher_allowed_in_dev() {
        let task = PublisherLookupTask::new(resolver(vec![]), true);
        let context = ctx("ghost", "example.com");

        task.run0(&context).await.unwrap();
        assert_eq!(context.publisher.get().unwrap().bid_multiplier, 1.0);
    }

    #[tokio::test]
    async fn test_suspended_publisher_rejects() {
        let mut suspended = active("p-B");
        suspended.status = PublisherStatus::Paused;

        let task = PublisherLookupTask::new(resolver(vec![suspended]), false);
        let context = ctx("p-B", "example.com");

        assert!(task.run0(&context).await.is_err());
        assert!(matches!(
            context.reject.get(),
            Some(RequestReject::PublisherSuspended)
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_domain_rejects() {
        let task = PublisherLookupTask::new(resolver(vec![active("p-A")]), false);
        let context = ctx("p-A", "evil.test");

        assert!(task.run0(&context).await.is_err());
        assert!(matches!(
            context.reject.get(),
            Some(RequestReject::UnauthorizedDomain)
        ));
    }
}
