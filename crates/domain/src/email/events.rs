//! Email domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, DomainId, MessageId, SubdomainId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on an email aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EmailEvent {
    EmailReceived(EmailReceivedData),
    EmailFavorited(FavoriteToggledData),
    EmailUnfavorited(FavoriteToggledData),
    EmailDeleted(EmailDeletedData),
}

impl DomainEvent for EmailEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EmailEvent::EmailReceived(_) => "EmailReceived",
            EmailEvent::EmailFavorited(_) => "EmailFavorited",
            EmailEvent::EmailUnfavorited(_) => "EmailUnfavorited",
            EmailEvent::EmailDeleted(_) => "EmailDeleted",
        }
    }
}

/// Data for EmailReceived event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailReceivedData {
    pub message_id: MessageId,
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,

    /// Envelope sender.
    pub sender: String,

    /// Envelope recipients on the owning subdomain.
    pub recipients: Vec<String>,

    pub subject: String,

    pub size_bytes: u64,

    /// Set when the message carried a campaign token.
    #[serde(default)]
    pub campaign_id: Option<AggregateId>,

    pub received_at: DateTime<Utc>,
}

/// Data for EmailFavorited and EmailUnfavorited events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteToggledData {
    pub at: DateTime<Utc>,
}

/// Why an email was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeletionReason {
    /// Deleted directly by its owner.
    User,

    /// Removed because its campaign was deleted.
    CampaignDeleted { campaign_id: AggregateId, force: bool },
}

/// Data for EmailDeleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailDeletedData {
    pub deleted_at: DateTime<Utc>,
    pub reason: DeletionReason,
}
