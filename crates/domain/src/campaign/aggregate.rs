//! Campaign aggregate implementation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{AggregateId, DomainId, MessageId, SubdomainId};

use crate::aggregate::Aggregate;

use super::{
    CampaignError, CampaignEvent, MAX_CAMPAIGN_VALUE_LEN,
    events::{CampaignCreatedData, CampaignDeletedData, CaptureRecordedData},
};

/// Campaign aggregate root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Campaign {
    id: Option<AggregateId>,
    domain_id: Option<DomainId>,
    subdomain_id: Option<SubdomainId>,
    value: String,
    created_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    deleted_with_force: bool,
    sample_message_id: Option<MessageId>,
    captured: BTreeSet<MessageId>,
    /// Counts capture events, repeats included.
    captures_recorded: u64,
}

impl Aggregate for Campaign {
    type Event = CampaignEvent;
    type Error = CampaignError;

    fn aggregate_type() -> &'static str {
        "Campaign"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CampaignEvent::CampaignCreated(data) => {
                self.id = Some(data.campaign_id);
                self.domain_id = Some(data.domain_id);
                self.subdomain_id = Some(data.subdomain_id);
                self.value = data.value;
                self.created_at = Some(data.created_at);
                self.sample_message_id = Some(data.first_message_id);
                self.captured.insert(data.first_message_id);
                self.captures_recorded += 1;
            }
            CampaignEvent::CampaignCaptureRecorded(data) => {
                self.captured.insert(data.message_id);
                self.captures_recorded += 1;
            }
            CampaignEvent::CampaignDeleted(data) => {
                self.deleted_at = Some(data.deleted_at);
                self.deleted_with_force = data.force;
            }
        }
    }
}

// Query methods
impl Campaign {
    pub fn domain_id(&self) -> Option<DomainId> {
        self.domain_id
    }

    pub fn subdomain_id(&self) -> Option<SubdomainId> {
        self.subdomain_id
    }

    /// Returns the campaign token.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns the `force` flag of the deletion, false while live.
    pub fn deleted_with_force(&self) -> bool {
        self.deleted_with_force
    }

    /// Returns the message the campaign was created from.
    pub fn sample_message_id(&self) -> Option<MessageId> {
        self.sample_message_id
    }

    /// Returns the distinct captured messages.
    pub fn captured(&self) -> &BTreeSet<MessageId> {
        &self.captured
    }

    pub fn contains(&self, message_id: MessageId) -> bool {
        self.captured.contains(&message_id)
    }

    /// Returns how many capture events were recorded, duplicates included.
    pub fn captures_recorded(&self) -> u64 {
        self.captures_recorded
    }
}

// Command methods (return events)
impl Campaign {
    /// Produces the creation event for a campaign first seen on
    /// `first_message_id`.
    pub fn create(
        campaign_id: AggregateId,
        domain_id: DomainId,
        subdomain_id: SubdomainId,
        value: String,
        first_message_id: MessageId,
        created_at: DateTime<Utc>,
    ) -> Result<Vec<CampaignEvent>, CampaignError> {
        if subdomain_id.is_nil() {
            return Err(CampaignError::InvalidCampaignData(
                "subdomain id is required".to_string(),
            ));
        }
        if value.is_empty() {
            return Err(CampaignError::InvalidCampaignData(
                "campaign value is required".to_string(),
            ));
        }
        if value.chars().count() > MAX_CAMPAIGN_VALUE_LEN {
            return Err(CampaignError::InvalidCampaignData(format!(
                "campaign value exceeds {MAX_CAMPAIGN_VALUE_LEN} characters"
            )));
        }
        if first_message_id.is_nil() {
            return Err(CampaignError::InvalidCampaignData(
                "first message id is required".to_string(),
            ));
        }

        Ok(vec![CampaignEvent::CampaignCreated(CampaignCreatedData {
            campaign_id,
            domain_id,
            subdomain_id,
            value,
            first_message_id,
            created_at,
        })])
    }

    /// Records a captured message.
    ///
    /// A message already in the set still raises an event; the set itself
    /// stays deduplicated.
    pub fn record_capture(
        &self,
        message_id: MessageId,
        captured_at: DateTime<Utc>,
    ) -> Result<Vec<CampaignEvent>, CampaignError> {
        if self.is_deleted() {
            return Err(CampaignError::CampaignAlreadyDeleted);
        }
        if message_id.is_nil() {
            return Err(CampaignError::InvalidCampaignData(
                "message id is required".to_string(),
            ));
        }

        Ok(vec![CampaignEvent::CampaignCaptureRecorded(
            CaptureRecordedData {
                message_id,
                captured_at,
            },
        )])
    }

    pub fn delete(
        &self,
        deleted_at: DateTime<Utc>,
        force: bool,
    ) -> Result<Vec<CampaignEvent>, CampaignError> {
        if self.is_deleted() {
            return Err(CampaignError::CampaignAlreadyDeleted);
        }
        Ok(vec![CampaignEvent::CampaignDeleted(CampaignDeletedData {
            deleted_at,
            force,
        })])
    }
}
