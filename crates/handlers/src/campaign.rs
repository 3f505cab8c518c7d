//! Campaign commands, including the capture coordinator.
//!
//! A campaign's id is derived from its subdomain and value, so two
//! deliveries carrying a new campaign value race to create the same stream.
//! Captures for one campaign therefore run one at a time under a per-id
//! lock. The lock only covers this process; a conflicting save from
//! elsewhere is caught by the store's version check, and the capture is
//! reloaded and applied again.

use chrono::{DateTime, Utc};
use common::{AggregateId, DomainId, MessageId, SubdomainId};
use domain::{AggregateRoot, Campaign, DomainError, Repository, derive_campaign_id};
use event_store::EventStore;
use tokio_util::sync::CancellationToken;

use crate::context::{HandlerContext, ensure_not_cancelled};
use crate::error::{HandlerError, Result};
use crate::integration::IntegrationEvent;
use crate::locks::KeyedLocks;
use crate::outcome::CommandOutcome;
use crate::validation::Validator;

/// Attempts at saving one capture before giving up on conflicts.
pub const DEFAULT_CAPTURE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct RecordCapture {
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub value: String,
    pub message_id: MessageId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRecorded {
    pub campaign_id: AggregateId,
    /// True when this capture created the campaign.
    pub created: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteCampaign {
    pub campaign_id: AggregateId,
    pub force: bool,
}

pub struct CampaignHandler<S: EventStore> {
    context: HandlerContext<S>,
    repository: Repository<S, Campaign>,
    locks: KeyedLocks,
    max_attempts: u32,
}

impl<S: EventStore + Clone> CampaignHandler<S> {
    /// Creates a handler that serializes captures through `locks`.
    ///
    /// Handlers in one process should share one registry.
    pub fn new(context: HandlerContext<S>, locks: KeyedLocks) -> Self {
        Self {
            repository: context.repository(),
            context,
            locks,
            max_attempts: DEFAULT_CAPTURE_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    /// Adds a message to the campaign named by `(subdomain_id, value)`,
    /// creating the campaign on its first message.
    #[tracing::instrument(skip(self, cancel), fields(message_id = %cmd.message_id))]
    pub async fn record_capture(
        &self,
        cmd: RecordCapture,
        cancel: &CancellationToken,
    ) -> CommandOutcome<CaptureRecorded> {
        self.try_record_capture(cmd, cancel).await.into()
    }

    async fn try_record_capture(
        &self,
        cmd: RecordCapture,
        cancel: &CancellationToken,
    ) -> Result<CaptureRecorded> {
        Validator::new()
            .required_id("subdomain_id", cmd.subdomain_id.is_nil())
            .required_id("message_id", cmd.message_id.is_nil())
            .campaign_value("value", &cmd.value)
            .finish()?;

        let campaign_id = derive_campaign_id(cmd.subdomain_id, &cmd.value);
        let _guard = self.locks.acquire(campaign_id, cancel).await?;
        let captured_at = self.context.now();

        for attempt in 1..=self.max_attempts {
            ensure_not_cancelled(cancel)?;
            match self.capture_once(campaign_id, &cmd, captured_at).await {
                Ok((root, created)) => {
                    self.after_capture(campaign_id, &cmd, &root, created, captured_at)
                        .await;
                    return Ok(CaptureRecorded {
                        campaign_id,
                        created,
                    });
                }
                Err(e) if e.is_conflict() => {
                    metrics::counter!("capture_conflicts_total").increment(1);
                    tracing::warn!(
                        %campaign_id,
                        attempt,
                        max_attempts = self.max_attempts,
                        "campaign changed underneath capture, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(HandlerError::CaptureConflict {
            attempts: self.max_attempts,
        })
    }

    /// One load, create-or-capture, save round.
    async fn capture_once(
        &self,
        campaign_id: AggregateId,
        cmd: &RecordCapture,
        captured_at: DateTime<Utc>,
    ) -> std::result::Result<(AggregateRoot<Campaign>, bool), DomainError> {
        match self.repository.load(campaign_id).await? {
            Some(mut root) => {
                root.execute(|campaign| campaign.record_capture(cmd.message_id, captured_at))?;
                self.repository.save(&mut root).await?;
                Ok((root, false))
            }
            None => {
                let mut root: AggregateRoot<Campaign> = AggregateRoot::new();
                root.raise_all(Campaign::create(
                    campaign_id,
                    cmd.domain_id,
                    cmd.subdomain_id,
                    cmd.value.clone(),
                    cmd.message_id,
                    captured_at,
                )?);
                self.repository.save(&mut root).await?;
                Ok((root, true))
            }
        }
    }

    async fn after_capture(
        &self,
        campaign_id: AggregateId,
        cmd: &RecordCapture,
        root: &AggregateRoot<Campaign>,
        created: bool,
        captured_at: DateTime<Utc>,
    ) {
        metrics::counter!("campaign_captures_recorded_total").increment(1);
        let event = if created {
            metrics::counter!("campaigns_created_total").increment(1);
            tracing::info!(%campaign_id, value = %cmd.value, "campaign created");
            IntegrationEvent::CampaignCreated {
                campaign_id,
                subdomain_id: cmd.subdomain_id,
                value: cmd.value.clone(),
                created_at: captured_at,
            }
        } else {
            tracing::debug!(%campaign_id, captured = root.captured().len(), "capture recorded");
            IntegrationEvent::CampaignCaptureRecorded {
                campaign_id,
                message_id: cmd.message_id,
                captured_at,
            }
        };
        self.context.publish([event]).await;
    }

    /// Soft-deletes a campaign. Its emails are deleted asynchronously by
    /// the deletion cascade.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn delete(&self, cmd: DeleteCampaign, cancel: &CancellationToken) -> CommandOutcome<()> {
        self.try_delete(cmd, cancel).await.into()
    }

    async fn try_delete(&self, cmd: DeleteCampaign, cancel: &CancellationToken) -> Result<()> {
        Validator::new()
            .required_id("campaign_id", cmd.campaign_id.is_nil())
            .finish()?;

        let _guard = self.locks.acquire(cmd.campaign_id, cancel).await?;
        let deleted_at = self.context.now();
        crate::context::update(&self.repository, cmd.campaign_id, cancel, |campaign| {
            campaign.delete(deleted_at, cmd.force)
        })
        .await?;

        tracing::info!(campaign_id = %cmd.campaign_id, force = cmd.force, "campaign deleted");
        self.context
            .publish([IntegrationEvent::CampaignDeleted {
                campaign_id: cmd.campaign_id,
                force: cmd.force,
                deleted_at,
            }])
            .await;
        Ok(())
    }
}
