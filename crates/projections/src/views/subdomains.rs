//! Subdomain read model, used by inbound routing to refuse mail for
//! suspended subdomains.

use chrono::{DateTime, Utc};
use common::{AggregateId, DomainId, SubdomainId};
use domain::{Aggregate, AuditTrail, Subdomain, SubdomainEvent, SuspensionKind};
use event_store::EventEnvelope;

use crate::Result;
use crate::document::{DocumentProjection, DocumentRules, Rule};

/// One subdomain as seen by queries.
#[derive(Debug, Clone, PartialEq)]
pub struct SubdomainSummary {
    pub id: SubdomainId,
    pub domain_id: DomainId,
    pub name: String,
    pub registered_at: DateTime<Utc>,
    pub suspensions: AuditTrail<SuspensionKind>,
}

impl SubdomainSummary {
    pub fn is_suspended(&self) -> bool {
        self.suspensions.current() == Some(SuspensionKind::Suspend)
    }
}

pub enum SubdomainPatch {
    Suspended {
        at: DateTime<Utc>,
        reason: Option<String>,
    },
    Unsuspended(DateTime<Utc>),
}

pub struct SubdomainRules;

impl DocumentRules for SubdomainRules {
    type Document = SubdomainSummary;
    type Patch = SubdomainPatch;
    const NAME: &'static str = "SubdomainsView";

    fn rule(event: &EventEnvelope) -> Result<Rule<SubdomainSummary, SubdomainPatch>> {
        if event.aggregate_type != Subdomain::aggregate_type() {
            return Ok(Rule::Ignore);
        }

        let rule = match serde_json::from_value::<SubdomainEvent>(event.payload.clone())? {
            SubdomainEvent::SubdomainRegistered(data) => Rule::Create(SubdomainSummary {
                id: data.subdomain_id,
                domain_id: data.domain_id,
                name: data.name,
                registered_at: data.registered_at,
                suspensions: AuditTrail::default(),
            }),
            SubdomainEvent::SubdomainSuspended(data) => Rule::Patch(SubdomainPatch::Suspended {
                at: data.at,
                reason: data.reason,
            }),
            SubdomainEvent::SubdomainUnsuspended(data) => {
                Rule::Patch(SubdomainPatch::Unsuspended(data.at))
            }
        };
        Ok(rule)
    }

    fn apply_patch(document: &mut SubdomainSummary, patch: SubdomainPatch, _event: &EventEnvelope) {
        match patch {
            SubdomainPatch::Suspended { at, reason } => {
                document
                    .suspensions
                    .record_with_reason(SuspensionKind::Suspend, at, reason);
            }
            SubdomainPatch::Unsuspended(at) => {
                document.suspensions.record(SuspensionKind::Unsuspend, at);
            }
        }
    }
}

/// Read model of every registered subdomain.
pub type SubdomainsView = DocumentProjection<SubdomainRules>;

impl DocumentProjection<SubdomainRules> {
    pub async fn get_subdomain(&self, subdomain_id: SubdomainId) -> Option<SubdomainSummary> {
        self.get(AggregateId::from(subdomain_id)).await
    }

    /// Returns true if the subdomain is known and currently suspended.
    pub async fn is_suspended(&self, subdomain_id: SubdomainId) -> bool {
        self.get_subdomain(subdomain_id)
            .await
            .is_some_and(|s| s.is_suspended())
    }

    pub async fn suspended(&self) -> Vec<SubdomainSummary> {
        self.filter(|s| s.is_suspended()).await
    }
}
