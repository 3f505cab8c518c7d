//! Subdomain commands.

use common::{DomainId, SubdomainId};
use domain::{Repository, Subdomain};
use event_store::EventStore;
use tokio_util::sync::CancellationToken;

use crate::context::{HandlerContext, create, update};
use crate::error::Result;
use crate::integration::IntegrationEvent;
use crate::outcome::CommandOutcome;
use crate::validation::Validator;

#[derive(Debug, Clone)]
pub struct RegisterSubdomain {
    pub subdomain_id: SubdomainId,
    pub domain_id: DomainId,
    pub name: String,
}

pub struct SubdomainHandler<S: EventStore> {
    context: HandlerContext<S>,
    repository: Repository<S, Subdomain>,
}

impl<S: EventStore + Clone> SubdomainHandler<S> {
    pub fn new(context: HandlerContext<S>) -> Self {
        Self {
            repository: context.repository(),
            context,
        }
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn register(
        &self,
        cmd: RegisterSubdomain,
        cancel: &CancellationToken,
    ) -> CommandOutcome<SubdomainId> {
        self.try_register(cmd, cancel).await.into()
    }

    async fn try_register(
        &self,
        cmd: RegisterSubdomain,
        cancel: &CancellationToken,
    ) -> Result<SubdomainId> {
        Validator::new()
            .required_id("subdomain_id", cmd.subdomain_id.is_nil())
            .required_id("domain_id", cmd.domain_id.is_nil())
            .subdomain_name("name", &cmd.name)
            .finish()?;

        let events = Subdomain::register(
            cmd.subdomain_id,
            cmd.domain_id,
            cmd.name.to_ascii_lowercase(),
            self.context.now(),
        );
        create(&self.repository, events, cancel).await?;
        tracing::info!(subdomain_id = %cmd.subdomain_id, "subdomain registered");
        Ok(cmd.subdomain_id)
    }

    /// Suspends a subdomain; inbound mail for it is refused until lifted.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn suspend(
        &self,
        subdomain_id: SubdomainId,
        reason: Option<String>,
        cancel: &CancellationToken,
    ) -> CommandOutcome<()> {
        let at = self.context.now();
        let published_reason = reason.clone();
        let result = update(&self.repository, subdomain_id.into(), cancel, |subdomain| {
            subdomain.suspend(reason, at)
        })
        .await;
        if result.is_ok() {
            tracing::info!("subdomain suspended");
            self.context
                .publish([IntegrationEvent::SubdomainSuspensionChanged {
                    subdomain_id,
                    suspended: true,
                    reason: published_reason,
                    at,
                }])
                .await;
        }
        result.map(|_| ()).into()
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn unsuspend(
        &self,
        subdomain_id: SubdomainId,
        cancel: &CancellationToken,
    ) -> CommandOutcome<()> {
        let at = self.context.now();
        let result = update(&self.repository, subdomain_id.into(), cancel, |subdomain| {
            subdomain.unsuspend(at)
        })
        .await;
        if result.is_ok() {
            tracing::info!("subdomain unsuspended");
            self.context
                .publish([IntegrationEvent::SubdomainSuspensionChanged {
                    subdomain_id,
                    suspended: false,
                    reason: None,
                    at,
                }])
                .await;
        }
        result.map(|_| ()).into()
    }
}
