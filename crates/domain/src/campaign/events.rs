//! Campaign domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, DomainId, MessageId, SubdomainId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on a campaign aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CampaignEvent {
    /// First message carrying the token was captured.
    CampaignCreated(CampaignCreatedData),

    /// A further message was captured. Raised for repeats too.
    CampaignCaptureRecorded(CaptureRecordedData),

    /// Campaign was soft-deleted.
    CampaignDeleted(CampaignDeletedData),
}

impl DomainEvent for CampaignEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CampaignEvent::CampaignCreated(_) => "CampaignCreated",
            CampaignEvent::CampaignCaptureRecorded(_) => "CampaignCaptureRecorded",
            CampaignEvent::CampaignDeleted(_) => "CampaignDeleted",
        }
    }
}

/// Data for CampaignCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignCreatedData {
    /// Derived from subdomain and value.
    pub campaign_id: AggregateId,

    pub domain_id: DomainId,

    pub subdomain_id: SubdomainId,

    /// The token as it appeared on the message.
    pub value: String,

    /// Becomes the campaign's sample message.
    pub first_message_id: MessageId,

    pub created_at: DateTime<Utc>,
}

/// Data for CampaignCaptureRecorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRecordedData {
    pub message_id: MessageId,
    pub captured_at: DateTime<Utc>,
}

/// Data for CampaignDeleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignDeletedData {
    pub deleted_at: DateTime<Utc>,

    /// Carried through to the cascaded email deletions.
    pub force: bool,
}
