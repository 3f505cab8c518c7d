//! Subdomain domain events.

use chrono::{DateTime, Utc};
use common::{DomainId, SubdomainId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on a subdomain aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SubdomainEvent {
    SubdomainRegistered(SubdomainRegisteredData),
    SubdomainSuspended(SubdomainSuspendedData),
    SubdomainUnsuspended(SubdomainUnsuspendedData),
}

impl DomainEvent for SubdomainEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SubdomainEvent::SubdomainRegistered(_) => "SubdomainRegistered",
            SubdomainEvent::SubdomainSuspended(_) => "SubdomainSuspended",
            SubdomainEvent::SubdomainUnsuspended(_) => "SubdomainUnsuspended",
        }
    }
}

/// Data for SubdomainRegistered event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdomainRegisteredData {
    pub subdomain_id: SubdomainId,
    pub domain_id: DomainId,

    /// Leftmost DNS label, e.g. `qa` in `qa.mail.example`.
    pub name: String,

    pub registered_at: DateTime<Utc>,
}

/// Data for SubdomainSuspended event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdomainSuspendedData {
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Data for SubdomainUnsuspended event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdomainUnsuspendedData {
    pub at: DateTime<Utc>,
}
