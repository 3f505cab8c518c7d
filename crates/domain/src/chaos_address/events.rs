//! Chaos address domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, DomainId, SubdomainId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::SmtpResponseCode;

/// Events that can occur on a chaos address aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChaosAddressEvent {
    ChaosAddressCreated(ChaosAddressCreatedData),
    ChaosAddressEnabled(ToggledData),
    ChaosAddressDisabled(ChaosAddressDisabledData),
    /// A message was answered with the configured fault.
    ChaosAddressReceived(ChaosAddressReceivedData),
    ChaosAddressDomainChanged(DomainChangedData),
    ChaosAddressSubdomainChanged(SubdomainChangedData),
    ChaosAddressLocalPartChanged(LocalPartChangedData),
    ChaosAddressResponseCodeChanged(ResponseCodeChangedData),
}

impl DomainEvent for ChaosAddressEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ChaosAddressEvent::ChaosAddressCreated(_) => "ChaosAddressCreated",
            ChaosAddressEvent::ChaosAddressEnabled(_) => "ChaosAddressEnabled",
            ChaosAddressEvent::ChaosAddressDisabled(_) => "ChaosAddressDisabled",
            ChaosAddressEvent::ChaosAddressReceived(_) => "ChaosAddressReceived",
            ChaosAddressEvent::ChaosAddressDomainChanged(_) => "ChaosAddressDomainChanged",
            ChaosAddressEvent::ChaosAddressSubdomainChanged(_) => "ChaosAddressSubdomainChanged",
            ChaosAddressEvent::ChaosAddressLocalPartChanged(_) => "ChaosAddressLocalPartChanged",
            ChaosAddressEvent::ChaosAddressResponseCodeChanged(_) => {
                "ChaosAddressResponseCodeChanged"
            }
        }
    }
}

/// Data for ChaosAddressCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosAddressCreatedData {
    pub chaos_address_id: AggregateId,
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub local_part: String,
    pub response_code: SmtpResponseCode,
    pub created_at: DateTime<Utc>,
}

/// Data for ChaosAddressEnabled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggledData {
    pub at: DateTime<Utc>,
}

/// Data for ChaosAddressDisabled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosAddressDisabledData {
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Data for ChaosAddressReceived event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosAddressReceivedData {
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainChangedData {
    pub domain_id: DomainId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdomainChangedData {
    pub subdomain_id: SubdomainId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalPartChangedData {
    pub local_part: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseCodeChangedData {
    pub response_code: SmtpResponseCode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_form_is_adjacently_tagged() {
        let event = ChaosAddressEvent::ChaosAddressResponseCodeChanged(ResponseCodeChangedData {
            response_code: SmtpResponseCode::try_from(421).unwrap(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ChaosAddressResponseCodeChanged");
        assert_eq!(json["data"]["response_code"], 421);

        let back: ChaosAddressEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_type(), "ChaosAddressResponseCodeChanged");
    }

    #[test]
    fn disabled_payload_without_reason_still_decodes() {
        let json = serde_json::json!({
            "type": "ChaosAddressDisabled",
            "data": { "at": "2024-06-01T09:00:00Z" }
        });

        let ChaosAddressEvent::ChaosAddressDisabled(data) = serde_json::from_value(json).unwrap()
        else {
            panic!("expected ChaosAddressDisabled");
        };
        assert_eq!(data.reason, None);
    }
}
