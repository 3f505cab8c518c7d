//! Chaos address commands.

use common::{AggregateId, DomainId, SubdomainId};
use domain::{AggregateRoot, ChaosAddress, ChaosAddressEdit, Repository};
use event_store::EventStore;
use tokio_util::sync::CancellationToken;

use crate::context::{HandlerContext, create, update};
use crate::error::Result;
use crate::integration::IntegrationEvent;
use crate::outcome::CommandOutcome;
use crate::validation::{Validator, parse_response_code};

#[derive(Debug, Clone)]
pub struct CreateChaosAddress {
    pub chaos_address_id: AggregateId,
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub local_part: String,
    pub response_code: u16,
}

impl CreateChaosAddress {
    /// Creates the command with a generated address id.
    pub fn new(
        domain_id: DomainId,
        subdomain_id: SubdomainId,
        local_part: impl Into<String>,
        response_code: u16,
    ) -> Self {
        Self {
            chaos_address_id: AggregateId::new(),
            domain_id,
            subdomain_id,
            local_part: local_part.into(),
            response_code,
        }
    }
}

/// Replaces the whole configuration; unchanged fields raise nothing.
#[derive(Debug, Clone)]
pub struct EditChaosAddress {
    pub chaos_address_id: AggregateId,
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub local_part: String,
    pub response_code: u16,
}

pub struct ChaosAddressHandler<S: EventStore> {
    context: HandlerContext<S>,
    repository: Repository<S, ChaosAddress>,
}

impl<S: EventStore + Clone> ChaosAddressHandler<S> {
    pub fn new(context: HandlerContext<S>) -> Self {
        Self {
            repository: context.repository(),
            context,
        }
    }

    /// Creates a disabled chaos address. Returns its id.
    #[tracing::instrument(skip(self, cancel), fields(chaos_address_id = %cmd.chaos_address_id))]
    pub async fn create(
        &self,
        cmd: CreateChaosAddress,
        cancel: &CancellationToken,
    ) -> CommandOutcome<AggregateId> {
        self.try_create(cmd, cancel).await.into()
    }

    async fn try_create(
        &self,
        cmd: CreateChaosAddress,
        cancel: &CancellationToken,
    ) -> Result<AggregateId> {
        Validator::new()
            .required_id("chaos_address_id", cmd.chaos_address_id.is_nil())
            .required_id("domain_id", cmd.domain_id.is_nil())
            .required_id("subdomain_id", cmd.subdomain_id.is_nil())
            .local_part("local_part", &cmd.local_part)
            .response_code("response_code", cmd.response_code)
            .finish()?;
        let response_code = parse_response_code("response_code", cmd.response_code)?;

        let events = ChaosAddress::create(
            cmd.chaos_address_id,
            cmd.domain_id,
            cmd.subdomain_id,
            cmd.local_part,
            response_code,
            self.context.now(),
        );
        let root = create(&self.repository, events, cancel).await?;

        tracing::info!("chaos address created");
        self.context
            .publish(updated(cmd.chaos_address_id, &root))
            .await;
        Ok(cmd.chaos_address_id)
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn enable(
        &self,
        chaos_address_id: AggregateId,
        cancel: &CancellationToken,
    ) -> CommandOutcome<()> {
        let at = self.context.now();
        let result = update(&self.repository, chaos_address_id, cancel, |address| {
            address.enable(at)
        })
        .await;
        self.finish_toggle(chaos_address_id, result).await
    }

    /// Disables the address. The reason is kept in its toggle history.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn disable(
        &self,
        chaos_address_id: AggregateId,
        reason: Option<String>,
        cancel: &CancellationToken,
    ) -> CommandOutcome<()> {
        let at = self.context.now();
        let result = update(&self.repository, chaos_address_id, cancel, |address| {
            address.disable(at, reason)
        })
        .await;
        self.finish_toggle(chaos_address_id, result).await
    }

    async fn finish_toggle(
        &self,
        chaos_address_id: AggregateId,
        result: Result<AggregateRoot<ChaosAddress>>,
    ) -> CommandOutcome<()> {
        match result {
            Ok(root) => {
                tracing::info!(enabled = root.is_enabled(), "chaos address toggled");
                self.context.publish(updated(chaos_address_id, &root)).await;
                CommandOutcome::Succeeded(())
            }
            Err(e) => e.into(),
        }
    }

    /// Applies an edit. Returns the number of fields that changed.
    #[tracing::instrument(skip(self, cancel), fields(chaos_address_id = %cmd.chaos_address_id))]
    pub async fn edit(
        &self,
        cmd: EditChaosAddress,
        cancel: &CancellationToken,
    ) -> CommandOutcome<usize> {
        self.try_edit(cmd, cancel).await.into()
    }

    async fn try_edit(&self, cmd: EditChaosAddress, cancel: &CancellationToken) -> Result<usize> {
        Validator::new()
            .required_id("chaos_address_id", cmd.chaos_address_id.is_nil())
            .required_id("domain_id", cmd.domain_id.is_nil())
            .required_id("subdomain_id", cmd.subdomain_id.is_nil())
            .local_part("local_part", &cmd.local_part)
            .response_code("response_code", cmd.response_code)
            .finish()?;
        let edit = ChaosAddressEdit {
            domain_id: cmd.domain_id,
            subdomain_id: cmd.subdomain_id,
            local_part: cmd.local_part,
            response_code: parse_response_code("response_code", cmd.response_code)?,
        };

        let mut changed = 0;
        let root = update(&self.repository, cmd.chaos_address_id, cancel, |address| {
            let events = address.edit(edit)?;
            changed = events.len();
            Ok(events)
        })
        .await?;

        if changed > 0 {
            tracing::info!(changed, "chaos address edited");
            self.context
                .publish(updated(cmd.chaos_address_id, &root))
                .await;
        }
        Ok(changed)
    }

    /// Counts a message answered with the address's fault code. Returns the
    /// new received count.
    ///
    /// The SMTP reply has already been decided when this runs, so it takes
    /// no cancellation token and reloads after every conflicting write
    /// until its own receive is stored.
    #[tracing::instrument(skip(self))]
    pub async fn record_receive(&self, chaos_address_id: AggregateId) -> CommandOutcome<u64> {
        self.try_record_receive(chaos_address_id).await.into()
    }

    async fn try_record_receive(&self, chaos_address_id: AggregateId) -> Result<u64> {
        let mut conflicts: u32 = 0;
        loop {
            let mut root = self.repository.get(chaos_address_id).await?;
            let events = root.record_receive(self.context.now());
            root.raise_all(events);

            match self.repository.save(&mut root).await {
                Ok(_) => {
                    metrics::counter!("chaos_receives_recorded_total").increment(1);
                    if conflicts > 0 {
                        tracing::debug!(conflicts, "receive stored after concurrent writes");
                    }
                    return Ok(root.received_count());
                }
                Err(e) if e.is_conflict() => {
                    conflicts += 1;
                    metrics::counter!("chaos_receive_conflicts_total").increment(1);
                    // Every conflict means another writer got through.
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn updated(
    chaos_address_id: AggregateId,
    root: &AggregateRoot<ChaosAddress>,
) -> Option<IntegrationEvent> {
    Some(IntegrationEvent::ChaosAddressUpdated {
        chaos_address_id,
        subdomain_id: root.subdomain_id(),
        local_part: root.local_part().to_string(),
        response_code: root.response_code()?.as_u16(),
        enabled: root.is_enabled(),
        received_count: root.received_count(),
    })
}
