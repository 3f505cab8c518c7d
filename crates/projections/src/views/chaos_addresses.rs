//! Chaos address read model, used by inbound routing to find the fault to
//! answer with.

use chrono::{DateTime, Utc};
use common::{AggregateId, DomainId, SubdomainId};
use domain::{Aggregate, AuditTrail, ChaosAddress, ChaosAddressEvent, ToggleKind};
use event_store::EventEnvelope;

use crate::Result;
use crate::document::{DocumentProjection, DocumentRules, Rule};

/// One chaos address as seen by queries.
#[derive(Debug, Clone, PartialEq)]
pub struct ChaosAddressSummary {
    pub id: AggregateId,
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub local_part: String,
    pub response_code: u16,
    pub received_count: u64,
    pub last_received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub toggles: AuditTrail<ToggleKind>,
}

impl ChaosAddressSummary {
    pub fn is_enabled(&self) -> bool {
        self.toggles.current() == Some(ToggleKind::Enabled)
    }
}

pub enum ChaosAddressPatch {
    Enabled(DateTime<Utc>),
    Disabled(DateTime<Utc>, Option<String>),
    Received(DateTime<Utc>),
    Domain(DomainId),
    Subdomain(SubdomainId),
    LocalPart(String),
    ResponseCode(u16),
}

pub struct ChaosAddressRules;

impl DocumentRules for ChaosAddressRules {
    type Document = ChaosAddressSummary;
    type Patch = ChaosAddressPatch;
    const NAME: &'static str = "ChaosAddressesView";

    fn rule(event: &EventEnvelope) -> Result<Rule<ChaosAddressSummary, ChaosAddressPatch>> {
        if event.aggregate_type != ChaosAddress::aggregate_type() {
            return Ok(Rule::Ignore);
        }

        let rule = match serde_json::from_value::<ChaosAddressEvent>(event.payload.clone())? {
            ChaosAddressEvent::ChaosAddressCreated(data) => Rule::Create(ChaosAddressSummary {
                id: data.chaos_address_id,
                domain_id: data.domain_id,
                subdomain_id: data.subdomain_id,
                local_part: data.local_part,
                response_code: data.response_code.as_u16(),
                received_count: 0,
                last_received_at: None,
                created_at: data.created_at,
                toggles: AuditTrail::default(),
            }),
            ChaosAddressEvent::ChaosAddressEnabled(data) => {
                Rule::Patch(ChaosAddressPatch::Enabled(data.at))
            }
            ChaosAddressEvent::ChaosAddressDisabled(data) => {
                Rule::Patch(ChaosAddressPatch::Disabled(data.at, data.reason))
            }
            ChaosAddressEvent::ChaosAddressReceived(data) => {
                Rule::Patch(ChaosAddressPatch::Received(data.received_at))
            }
            ChaosAddressEvent::ChaosAddressDomainChanged(data) => {
                Rule::Patch(ChaosAddressPatch::Domain(data.domain_id))
            }
            ChaosAddressEvent::ChaosAddressSubdomainChanged(data) => {
                Rule::Patch(ChaosAddressPatch::Subdomain(data.subdomain_id))
            }
            ChaosAddressEvent::ChaosAddressLocalPartChanged(data) => {
                Rule::Patch(ChaosAddressPatch::LocalPart(data.local_part))
            }
            ChaosAddressEvent::ChaosAddressResponseCodeChanged(data) => {
                Rule::Patch(ChaosAddressPatch::ResponseCode(data.response_code.as_u16()))
            }
        };
        Ok(rule)
    }

    fn apply_patch(
        document: &mut ChaosAddressSummary,
        patch: ChaosAddressPatch,
        _event: &EventEnvelope,
    ) {
        match patch {
            ChaosAddressPatch::Enabled(at) => {
                document.toggles.record(ToggleKind::Enabled, at);
            }
            ChaosAddressPatch::Disabled(at, reason) => {
                document
                    .toggles
                    .record_with_reason(ToggleKind::Disabled, at, reason);
            }
            ChaosAddressPatch::Received(at) => {
                document.received_count += 1;
                document.last_received_at = Some(at);
            }
            ChaosAddressPatch::Domain(domain_id) => document.domain_id = domain_id,
            ChaosAddressPatch::Subdomain(subdomain_id) => document.subdomain_id = subdomain_id,
            ChaosAddressPatch::LocalPart(local_part) => document.local_part = local_part,
            ChaosAddressPatch::ResponseCode(code) => document.response_code = code,
        }
    }
}

/// Read model of every chaos address.
pub type ChaosAddressesView = DocumentProjection<ChaosAddressRules>;

impl DocumentProjection<ChaosAddressRules> {
    /// Finds the address configured for a recipient, if any.
    ///
    /// Local parts compare case-insensitively.
    pub async fn find_by_address(
        &self,
        subdomain_id: SubdomainId,
        local_part: &str,
    ) -> Option<ChaosAddressSummary> {
        self.find(|a| {
            a.subdomain_id == subdomain_id && a.local_part.eq_ignore_ascii_case(local_part)
        })
        .await
    }

    /// Gets every address owned by a subdomain.
    pub async fn for_subdomain(&self, subdomain_id: SubdomainId) -> Vec<ChaosAddressSummary> {
        self.filter(|a| a.subdomain_id == subdomain_id).await
    }
}
