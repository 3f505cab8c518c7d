//! Email read model.

use chrono::{DateTime, Utc};
use common::{AggregateId, DomainId, MessageId, SubdomainId};
use domain::{Aggregate, DeletionReason, Email, EmailEvent};
use event_store::EventEnvelope;

use crate::Result;
use crate::document::{DocumentProjection, DocumentRules, Rule};

/// One email as seen by queries.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailSummary {
    pub message_id: MessageId,
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub size_bytes: u64,
    pub campaign_id: Option<AggregateId>,
    pub received_at: DateTime<Utc>,
    pub favorite: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deletion_reason: Option<DeletionReason>,
}

impl EmailSummary {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

pub enum EmailPatch {
    Favorite(bool),
    Deleted {
        at: DateTime<Utc>,
        reason: DeletionReason,
    },
}

pub struct EmailRules;

impl DocumentRules for EmailRules {
    type Document = EmailSummary;
    type Patch = EmailPatch;
    const NAME: &'static str = "EmailsView";

    fn rule(event: &EventEnvelope) -> Result<Rule<EmailSummary, EmailPatch>> {
        if event.aggregate_type != Email::aggregate_type() {
            return Ok(Rule::Ignore);
        }

        let rule = match serde_json::from_value::<EmailEvent>(event.payload.clone())? {
            EmailEvent::EmailReceived(data) => Rule::Create(EmailSummary {
                message_id: data.message_id,
                domain_id: data.domain_id,
                subdomain_id: data.subdomain_id,
                sender: data.sender,
                recipients: data.recipients,
                subject: data.subject,
                size_bytes: data.size_bytes,
                campaign_id: data.campaign_id,
                received_at: data.received_at,
                favorite: false,
                deleted_at: None,
                deletion_reason: None,
            }),
            EmailEvent::EmailFavorited(_) => Rule::Patch(EmailPatch::Favorite(true)),
            EmailEvent::EmailUnfavorited(_) => Rule::Patch(EmailPatch::Favorite(false)),
            EmailEvent::EmailDeleted(data) => Rule::Patch(EmailPatch::Deleted {
                at: data.deleted_at,
                reason: data.reason,
            }),
        };
        Ok(rule)
    }

    fn apply_patch(document: &mut EmailSummary, patch: EmailPatch, _event: &EventEnvelope) {
        match patch {
            EmailPatch::Favorite(favorite) => document.favorite = favorite,
            EmailPatch::Deleted { at, reason } => {
                document.deleted_at = Some(at);
                document.deletion_reason = Some(reason);
            }
        }
    }
}

/// Read model of every email, deleted ones included.
pub type EmailsView = DocumentProjection<EmailRules>;

impl DocumentProjection<EmailRules> {
    pub async fn get_email(&self, message_id: MessageId) -> Option<EmailSummary> {
        self.get(message_id.into()).await
    }

    /// Gets every email tagged with a campaign, deleted ones included.
    pub async fn for_campaign(&self, campaign_id: AggregateId) -> Vec<EmailSummary> {
        self.filter(|e| e.campaign_id == Some(campaign_id)).await
    }

    /// Gets the emails tagged with a campaign that are not deleted.
    pub async fn live_for_campaign(&self, campaign_id: AggregateId) -> Vec<EmailSummary> {
        self.filter(|e| e.campaign_id == Some(campaign_id) && !e.is_deleted())
            .await
    }

    /// Gets the live emails of a subdomain, newest first.
    pub async fn inbox(&self, subdomain_id: SubdomainId) -> Vec<EmailSummary> {
        let mut emails = self
            .filter(|e| e.subdomain_id == subdomain_id && !e.is_deleted())
            .await;
        emails.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        emails
    }
}
