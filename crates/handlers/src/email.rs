//! Email commands.

use common::{AggregateId, DomainId, MessageId, SubdomainId};
use domain::{DeletionReason, Email, ReceivedEmail, Repository};
use event_store::EventStore;
use tokio_util::sync::CancellationToken;

use crate::context::{HandlerContext, create, update};
use crate::error::Result;
use crate::integration::IntegrationEvent;
use crate::outcome::CommandOutcome;
use crate::validation::Validator;

#[derive(Debug, Clone)]
pub struct ReceiveEmail {
    pub message_id: MessageId,
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub size_bytes: u64,
    pub campaign_id: Option<AggregateId>,
}

pub struct EmailHandler<S: EventStore> {
    context: HandlerContext<S>,
    repository: Repository<S, Email>,
}

impl<S: EventStore + Clone> EmailHandler<S> {
    pub fn new(context: HandlerContext<S>) -> Self {
        Self {
            repository: context.repository(),
            context,
        }
    }

    /// Stores an accepted message.
    #[tracing::instrument(
        skip(self, cmd, cancel),
        fields(message_id = %cmd.message_id, subdomain_id = %cmd.subdomain_id)
    )]
    pub async fn receive(&self, cmd: ReceiveEmail, cancel: &CancellationToken) -> CommandOutcome<()> {
        self.try_receive(cmd, cancel).await.into()
    }

    async fn try_receive(&self, cmd: ReceiveEmail, cancel: &CancellationToken) -> Result<()> {
        Validator::new()
            .required_id("message_id", cmd.message_id.is_nil())
            .required_id("domain_id", cmd.domain_id.is_nil())
            .required_id("subdomain_id", cmd.subdomain_id.is_nil())
            .finish()?;

        let received_at = self.context.now();
        let integration = IntegrationEvent::EmailReceived {
            message_id: cmd.message_id,
            subdomain_id: cmd.subdomain_id,
            campaign_id: cmd.campaign_id,
            received_at,
        };
        let events = Email::receive(ReceivedEmail {
            message_id: cmd.message_id,
            domain_id: cmd.domain_id,
            subdomain_id: cmd.subdomain_id,
            sender: cmd.sender,
            recipients: cmd.recipients,
            subject: cmd.subject,
            size_bytes: cmd.size_bytes,
            campaign_id: cmd.campaign_id,
            received_at,
        });
        create(&self.repository, events, cancel).await?;

        metrics::counter!("emails_received_total").increment(1);
        self.context.publish([integration]).await;
        Ok(())
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn favorite(&self, message_id: MessageId, cancel: &CancellationToken) -> CommandOutcome<()> {
        let at = self.context.now();
        update(&self.repository, message_id.into(), cancel, |email| email.favorite(at))
            .await
            .map(|_| ())
            .into()
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn unfavorite(
        &self,
        message_id: MessageId,
        cancel: &CancellationToken,
    ) -> CommandOutcome<()> {
        let at = self.context.now();
        update(&self.repository, message_id.into(), cancel, |email| email.unfavorite(at))
            .await
            .map(|_| ())
            .into()
    }

    /// Deletes a message on the user's request.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn delete(&self, message_id: MessageId, cancel: &CancellationToken) -> CommandOutcome<()> {
        self.delete_with_reason(message_id, DeletionReason::User, cancel)
            .await
    }

    /// Soft-deletes a message, recording why.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn delete_with_reason(
        &self,
        message_id: MessageId,
        reason: DeletionReason,
        cancel: &CancellationToken,
    ) -> CommandOutcome<()> {
        let deleted_at = self.context.now();
        let result = update(&self.repository, message_id.into(), cancel, |email| {
            email.delete(deleted_at, reason)
        })
        .await;
        if result.is_ok() {
            self.context
                .publish([IntegrationEvent::EmailDeleted {
                    message_id,
                    reason,
                    deleted_at,
                }])
                .await;
        }
        result.map(|_| ()).into()
    }
}
