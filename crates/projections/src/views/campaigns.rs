//! Campaign read model.

use chrono::{DateTime, Utc};
use common::{AggregateId, DomainId, MessageId, SubdomainId};
use domain::{Aggregate, Campaign, CampaignEvent};
use event_store::EventEnvelope;

use crate::Result;
use crate::document::{DocumentProjection, DocumentRules, Rule, append_unique};

/// One campaign as seen by queries.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignSummary {
    pub id: AggregateId,
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub value: String,
    pub sample_message_id: MessageId,
    /// Distinct captured messages, in first-capture order.
    pub message_ids: Vec<MessageId>,
    pub created_at: DateTime<Utc>,
    pub last_captured_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl CampaignSummary {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn capture_count(&self) -> usize {
        self.message_ids.len()
    }
}

pub enum CampaignPatch {
    Captured {
        message_id: MessageId,
        at: DateTime<Utc>,
    },
    Deleted(DateTime<Utc>),
}

pub struct CampaignRules;

impl DocumentRules for CampaignRules {
    type Document = CampaignSummary;
    type Patch = CampaignPatch;
    const NAME: &'static str = "CampaignsView";

    fn rule(event: &EventEnvelope) -> Result<Rule<CampaignSummary, CampaignPatch>> {
        if event.aggregate_type != Campaign::aggregate_type() {
            return Ok(Rule::Ignore);
        }

        let rule = match serde_json::from_value::<CampaignEvent>(event.payload.clone())? {
            CampaignEvent::CampaignCreated(data) => Rule::Create(CampaignSummary {
                id: data.campaign_id,
                domain_id: data.domain_id,
                subdomain_id: data.subdomain_id,
                value: data.value,
                sample_message_id: data.first_message_id,
                message_ids: vec![data.first_message_id],
                created_at: data.created_at,
                last_captured_at: data.created_at,
                deleted_at: None,
            }),
            CampaignEvent::CampaignCaptureRecorded(data) => Rule::Patch(CampaignPatch::Captured {
                message_id: data.message_id,
                at: data.captured_at,
            }),
            CampaignEvent::CampaignDeleted(data) => {
                Rule::Patch(CampaignPatch::Deleted(data.deleted_at))
            }
        };
        Ok(rule)
    }

    fn apply_patch(document: &mut CampaignSummary, patch: CampaignPatch, _event: &EventEnvelope) {
        match patch {
            CampaignPatch::Captured { message_id, at } => {
                append_unique(&mut document.message_ids, [message_id]);
                document.last_captured_at = document.last_captured_at.max(at);
            }
            CampaignPatch::Deleted(at) => document.deleted_at = Some(at),
        }
    }
}

/// Read model of every campaign, deleted ones included.
pub type CampaignsView = DocumentProjection<CampaignRules>;

impl DocumentProjection<CampaignRules> {
    /// Gets the live campaigns on a subdomain, most recently captured first.
    pub async fn for_subdomain(&self, subdomain_id: SubdomainId) -> Vec<CampaignSummary> {
        let mut campaigns = self
            .filter(|c| c.subdomain_id == subdomain_id && !c.is_deleted())
            .await;
        campaigns.sort_by(|a, b| b.last_captured_at.cmp(&a.last_captured_at));
        campaigns
    }

    /// Finds a campaign by its token on a subdomain.
    pub async fn find_by_value(
        &self,
        subdomain_id: SubdomainId,
        value: &str,
    ) -> Option<CampaignSummary> {
        self.find(|c| c.subdomain_id == subdomain_id && c.value == value)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Projection;
    use chrono::Duration;
    use domain::{DomainEvent, campaign::CaptureRecordedData, derive_campaign_id};
    use event_store::{Position, Version};

    fn envelope(id: AggregateId, n: i64, event: &CampaignEvent) -> EventEnvelope {
        let mut envelope = EventEnvelope::builder()
            .aggregate_id(id)
            .aggregate_type("Campaign")
            .event_type(event.event_type())
            .version(Version::new(n))
            .payload(event)
            .unwrap()
            .build()
            .unwrap();
        envelope.position = Position::new(n as u64);
        envelope
    }

    #[tokio::test]
    async fn captures_append_without_duplicates() {
        let view = CampaignsView::new();
        let subdomain = SubdomainId::new();
        let id = derive_campaign_id(subdomain, "promo1");
        let (m1, m2) = (MessageId::new(), MessageId::new());
        let t0 = Utc::now();

        let created =
            Campaign::create(id, DomainId::new(), subdomain, "promo1".into(), m1, t0).unwrap();
        view.handle(&envelope(id, 1, &created[0])).await.unwrap();

        for (n, message_id) in [(2, m2), (3, m1), (4, m2)] {
            let event = CampaignEvent::CampaignCaptureRecorded(CaptureRecordedData {
                message_id,
                captured_at: t0 + Duration::seconds(n),
            });
            view.handle(&envelope(id, n, &event)).await.unwrap();
        }

        let summary = view.get(id).await.unwrap();
        assert_eq!(summary.message_ids, vec![m1, m2]);
        assert_eq!(summary.sample_message_id, m1);
        assert_eq!(summary.last_captured_at, t0 + Duration::seconds(4));
        assert_eq!(
            view.find_by_value(subdomain, "promo1").await.map(|c| c.id),
            Some(id)
        );
    }

    #[tokio::test]
    async fn deleted_campaigns_leave_subdomain_listing() {
        let view = CampaignsView::new();
        let subdomain = SubdomainId::new();
        let id = derive_campaign_id(subdomain, "gone");

        let created = Campaign::create(
            id,
            DomainId::new(),
            subdomain,
            "gone".into(),
            MessageId::new(),
            Utc::now(),
        )
        .unwrap();
        view.handle(&envelope(id, 1, &created[0])).await.unwrap();
        assert_eq!(view.for_subdomain(subdomain).await.len(), 1);

        let deleted = CampaignEvent::CampaignDeleted(domain::campaign::CampaignDeletedData {
            deleted_at: Utc::now(),
            force: false,
        });
        view.handle(&envelope(id, 2, &deleted)).await.unwrap();

        assert!(view.for_subdomain(subdomain).await.is_empty());
        assert!(view.get(id).await.unwrap().is_deleted());
    }
}
