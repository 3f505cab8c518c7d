//! Campaign deletion cascade.
//!
//! Deleting a campaign soft-deletes every live email captured into it. The
//! cascade runs as a projection, so it is eventually consistent with the
//! campaign deletion and may see the same deletion more than once.

use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, MessageId};
use domain::{
    Aggregate, Campaign, CampaignEvent, DeletionReason, DomainError, Email, EmailError, Repository,
};
use event_store::{EventEnvelope, EventStore};
use tokio::sync::RwLock;

use crate::projection::{Projection, ProjectionPosition};
use crate::views::EmailsView;
use crate::{ProjectionError, Result};

/// Outcome of cascading to one email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cascaded {
    Deleted,
    AlreadyDeleted,
}

/// Appends an `EmailDeleted` event to every live email of a deleted
/// campaign.
///
/// Must be registered after the [`EmailsView`] it reads, so the view has
/// seen every email received before the deletion.
pub struct CampaignDeletionCascade<S: EventStore> {
    emails: EmailsView,
    repository: Repository<S, Email>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl<S: EventStore + Clone> Clone for CampaignDeletionCascade<S> {
    fn clone(&self) -> Self {
        Self {
            emails: self.emails.clone(),
            repository: self.repository.clone(),
            position: Arc::clone(&self.position),
        }
    }
}

impl<S: EventStore> CampaignDeletionCascade<S> {
    pub fn new(store: S, emails: EmailsView) -> Self {
        Self {
            emails,
            repository: Repository::new(store),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    #[tracing::instrument(skip(self, deleted_at, reason))]
    async fn delete_email(
        &self,
        message_id: MessageId,
        deleted_at: chrono::DateTime<chrono::Utc>,
        reason: DeletionReason,
    ) -> Result<Cascaded> {
        let id = AggregateId::from(message_id);

        // One retry after a conflicting concurrent write to the same email.
        let mut retried = false;
        loop {
            let Some(mut email) = self.repository.load(id).await? else {
                tracing::warn!("email listed in the read model has no stream");
                return Ok(Cascaded::AlreadyDeleted);
            };

            match email.execute(|e| e.delete(deleted_at, reason)) {
                Ok(_) => {}
                Err(EmailError::AlreadyDeleted) => return Ok(Cascaded::AlreadyDeleted),
                Err(e) => return Err(DomainError::from(e).into()),
            }

            match self.repository.save(&mut email).await {
                Ok(_) => return Ok(Cascaded::Deleted),
                Err(e) if e.is_conflict() && !retried => {
                    tracing::debug!("conflict while deleting email, reloading");
                    retried = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn cascade(&self, campaign_id: AggregateId, event: &CampaignEvent) -> Result<()> {
        let CampaignEvent::CampaignDeleted(data) = event else {
            return Ok(());
        };
        let reason = DeletionReason::CampaignDeleted {
            campaign_id,
            force: data.force,
        };

        let targets = self.emails.live_for_campaign(campaign_id).await;
        let mut deleted = 0u64;
        for email in &targets {
            if self
                .delete_email(email.message_id, data.deleted_at, reason)
                .await?
                == Cascaded::Deleted
            {
                deleted += 1;
            }
        }

        metrics::counter!("cascade_emails_deleted_total").increment(deleted);
        tracing::info!(
            %campaign_id,
            force = data.force,
            candidates = targets.len(),
            deleted,
            "campaign deletion cascaded"
        );
        Ok(())
    }
}

#[async_trait]
impl<S> Projection for CampaignDeletionCascade<S>
where
    S: EventStore + 'static,
{
    fn name(&self) -> &'static str {
        "CampaignDeletionCascade"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut position = self.position.write().await;
        if position.has_seen(event.position) {
            return Ok(());
        }

        if event.aggregate_type == Campaign::aggregate_type() && event.event_type == "CampaignDeleted"
        {
            let campaign_event: CampaignEvent = serde_json::from_value(event.payload.clone())
                .map_err(ProjectionError::Deserialization)?;
            self.cascade(event.aggregate_id, &campaign_event).await?;
        }

        *position = position.advance(event.position);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        // Emails deleted by an earlier pass stay deleted and are skipped on
        // replay.
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}
