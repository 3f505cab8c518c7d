//! Email aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, DomainId, MessageId, SubdomainId};

use crate::aggregate::Aggregate;

use super::{
    DeletionReason, EmailError, EmailEvent,
    events::{EmailDeletedData, EmailReceivedData, FavoriteToggledData},
};

/// A message accepted for a subdomain, as handed to `Email::receive`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedEmail {
    pub message_id: MessageId,
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub size_bytes: u64,
    pub campaign_id: Option<AggregateId>,
    pub received_at: DateTime<Utc>,
}

/// Email aggregate root. The stream id is the message id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Email {
    message_id: Option<MessageId>,
    domain_id: Option<DomainId>,
    subdomain_id: Option<SubdomainId>,
    sender: String,
    recipients: Vec<String>,
    subject: String,
    size_bytes: u64,
    campaign_id: Option<AggregateId>,
    received_at: Option<DateTime<Utc>>,
    favorite: bool,
    deleted_at: Option<DateTime<Utc>>,
    deletion_reason: Option<DeletionReason>,
}

impl Aggregate for Email {
    type Event = EmailEvent;
    type Error = EmailError;

    fn aggregate_type() -> &'static str {
        "Email"
    }

    fn id(&self) -> Option<AggregateId> {
        self.message_id.map(AggregateId::from)
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            EmailEvent::EmailReceived(data) => {
                self.message_id = Some(data.message_id);
                self.domain_id = Some(data.domain_id);
                self.subdomain_id = Some(data.subdomain_id);
                self.sender = data.sender;
                self.recipients = data.recipients;
                self.subject = data.subject;
                self.size_bytes = data.size_bytes;
                self.campaign_id = data.campaign_id;
                self.received_at = Some(data.received_at);
            }
            EmailEvent::EmailFavorited(_) => self.favorite = true,
            EmailEvent::EmailUnfavorited(_) => self.favorite = false,
            EmailEvent::EmailDeleted(data) => {
                self.deleted_at = Some(data.deleted_at);
                self.deletion_reason = Some(data.reason);
            }
        }
    }
}

// Query methods
impl Email {
    pub fn message_id(&self) -> Option<MessageId> {
        self.message_id
    }

    pub fn domain_id(&self) -> Option<DomainId> {
        self.domain_id
    }

    pub fn subdomain_id(&self) -> Option<SubdomainId> {
        self.subdomain_id
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Returns the campaign this message was captured into, if any.
    pub fn campaign_id(&self) -> Option<AggregateId> {
        self.campaign_id
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    pub fn is_favorite(&self) -> bool {
        self.favorite
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn deletion_reason(&self) -> Option<DeletionReason> {
        self.deletion_reason
    }
}

// Command methods (return events)
impl Email {
    pub fn receive(email: ReceivedEmail) -> Vec<EmailEvent> {
        vec![EmailEvent::EmailReceived(EmailReceivedData {
            message_id: email.message_id,
            domain_id: email.domain_id,
            subdomain_id: email.subdomain_id,
            sender: email.sender,
            recipients: email.recipients,
            subject: email.subject,
            size_bytes: email.size_bytes,
            campaign_id: email.campaign_id,
            received_at: email.received_at,
        })]
    }

    pub fn favorite(&self, at: DateTime<Utc>) -> Result<Vec<EmailEvent>, EmailError> {
        self.ensure_live()?;
        if self.favorite {
            return Err(EmailError::AlreadyFavorited);
        }
        Ok(vec![EmailEvent::EmailFavorited(FavoriteToggledData { at })])
    }

    pub fn unfavorite(&self, at: DateTime<Utc>) -> Result<Vec<EmailEvent>, EmailError> {
        self.ensure_live()?;
        if !self.favorite {
            return Err(EmailError::NotFavorited);
        }
        Ok(vec![EmailEvent::EmailUnfavorited(FavoriteToggledData {
            at,
        })])
    }

    pub fn delete(
        &self,
        deleted_at: DateTime<Utc>,
        reason: DeletionReason,
    ) -> Result<Vec<EmailEvent>, EmailError> {
        self.ensure_live()?;
        Ok(vec![EmailEvent::EmailDeleted(EmailDeletedData {
            deleted_at,
            reason,
        })])
    }

    fn ensure_live(&self) -> Result<(), EmailError> {
        if self.is_deleted() {
            Err(EmailError::AlreadyDeleted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregateRoot;

    fn received(campaign_id: Option<AggregateId>) -> AggregateRoot<Email> {
        let mut root : AggregateRoot<Email> = AggregateRoot::new();
        root.raise_all(Email::receive(ReceivedEmail {
            message_id: MessageId::new(),
            domain_id: DomainId::new(),
            subdomain_id: SubdomainId::new(),
            sender: "news@shop.example".to_string(),
            recipients: vec!["me@test.mail.example".to_string()],
            subject: "Sale".to_string(),
            size_bytes: 2048,
            campaign_id,
            received_at: Utc::now(),
        }));
        root
    }

    #[test]
    fn stream_id_is_message_id() {
        let root = received(None);
        assert_eq!(root.id(), root.message_id().map(AggregateId::from));
        assert_eq!(root.recipients().len(), 1);
    }

    #[test]
    fn favorite_toggles_are_strict() {
        let mut root = received(None);

        assert!(matches!(
            root.unfavorite(Utc::now()),
            Err(EmailError::NotFavorited)
        ));
        root.execute(|e| e.favorite(Utc::now())).unwrap();
        assert!(matches!(
            root.favorite(Utc::now()),
            Err(EmailError::AlreadyFavorited)
        ));
        root.execute(|e| e.unfavorite(Utc::now())).unwrap();
        assert!(!root.is_favorite());
    }

    #[test]
    fn deleted_email_rejects_everything() {
        let campaign_id = AggregateId::new();
        let mut root = received(Some(campaign_id));
        let reason = DeletionReason::CampaignDeleted {
            campaign_id,
            force: false,
        };

        root.execute(|e| e.delete(Utc::now(), reason)).unwrap();

        assert_eq!(root.deletion_reason(), Some(reason));
        assert!(matches!(
            root.delete(Utc::now(), DeletionReason::User),
            Err(EmailError::AlreadyDeleted)
        ));
        assert!(matches!(
            root.favorite(Utc::now()),
            Err(EmailError::AlreadyDeleted)
        ));
    }
}
