//! Chaos address aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, DomainId, SubdomainId};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::audit::AuditTrail;

use super::{
    ChaosAddressError, ChaosAddressEvent, SmtpResponseCode,
    events::{
        ChaosAddressCreatedData, ChaosAddressDisabledData, ChaosAddressReceivedData, DomainChangedData,
        LocalPartChangedData, ResponseCodeChangedData, SubdomainChangedData, ToggledData,
    },
};

/// Kind of an entry in a chaos address's enable/disable history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToggleKind {
    Enabled,
    Disabled,
}

/// The full desired configuration of a chaos address.
///
/// Fields equal to the current values are left alone by `edit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaosAddressEdit {
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub local_part: String,
    pub response_code: SmtpResponseCode,
}

/// Chaos address aggregate root.
///
/// Created disabled. Once it has answered a message its owning domain and
/// subdomain are fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChaosAddress {
    id: Option<AggregateId>,
    domain_id: DomainId,
    subdomain_id: SubdomainId,
    local_part: String,
    response_code: Option<SmtpResponseCode>,
    received_count: u64,
    last_received_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    toggles: AuditTrail<ToggleKind>,
}

impl Default for ChaosAddress {
    fn default() -> Self {
        Self {
            id: None,
            domain_id: DomainId::nil(),
            subdomain_id: SubdomainId::nil(),
            local_part: String::new(),
            response_code: None,
            received_count: 0,
            last_received_at: None,
            created_at: None,
            toggles: AuditTrail::default(),
        }
    }
}

impl Aggregate for ChaosAddress {
    type Event = ChaosAddressEvent;
    type Error = ChaosAddressError;

    fn aggregate_type() -> &'static str {
        "ChaosAddress"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ChaosAddressEvent::ChaosAddressCreated(data) => {
                self.id = Some(data.chaos_address_id);
                self.domain_id = data.domain_id;
                self.subdomain_id = data.subdomain_id;
                self.local_part = data.local_part;
                self.response_code = Some(data.response_code);
                self.created_at = Some(data.created_at);
            }
            ChaosAddressEvent::ChaosAddressEnabled(data) => {
                self.toggles.record(ToggleKind::Enabled, data.at);
            }
            ChaosAddressEvent::ChaosAddressDisabled(data) => {
                self.toggles
                    .record_with_reason(ToggleKind::Disabled, data.at, data.reason);
            }
            ChaosAddressEvent::ChaosAddressReceived(data) => {
                self.received_count += 1;
                self.last_received_at = Some(data.received_at);
            }
            ChaosAddressEvent::ChaosAddressDomainChanged(data) => {
                self.domain_id = data.domain_id;
            }
            ChaosAddressEvent::ChaosAddressSubdomainChanged(data) => {
                self.subdomain_id = data.subdomain_id;
            }
            ChaosAddressEvent::ChaosAddressLocalPartChanged(data) => {
                self.local_part = data.local_part;
            }
            ChaosAddressEvent::ChaosAddressResponseCodeChanged(data) => {
                self.response_code = Some(data.response_code);
            }
        }
    }
}

// Query methods
impl ChaosAddress {
    pub fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    pub fn subdomain_id(&self) -> SubdomainId {
        self.subdomain_id
    }

    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    /// Returns the configured reply code, or None before creation.
    pub fn response_code(&self) -> Option<SmtpResponseCode> {
        self.response_code
    }

    /// Returns the number of messages this address has answered.
    pub fn received_count(&self) -> u64 {
        self.received_count
    }

    pub fn last_received_at(&self) -> Option<DateTime<Utc>> {
        self.last_received_at
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Returns true when the latest toggle entry is an enable.
    pub fn is_enabled(&self) -> bool {
        self.toggles.current() == Some(ToggleKind::Enabled)
    }

    /// Reason given for the disable currently in force, if any.
    pub fn disabled_reason(&self) -> Option<&str> {
        self.toggles
            .latest()
            .filter(|entry| entry.kind == ToggleKind::Disabled)
            .and_then(|entry| entry.reason.as_deref())
    }

    /// Returns the enable/disable history.
    pub fn toggles(&self) -> &AuditTrail<ToggleKind> {
        &self.toggles
    }
}

// Command methods (return events)
impl ChaosAddress {
    /// Produces the creation event for a new, disabled address.
    ///
    /// Input validation happens before this is called.
    pub fn create(
        chaos_address_id: AggregateId,
        domain_id: DomainId,
        subdomain_id: SubdomainId,
        local_part: String,
        response_code: SmtpResponseCode,
        created_at: DateTime<Utc>,
    ) -> Vec<ChaosAddressEvent> {
        vec![ChaosAddressEvent::ChaosAddressCreated(
            ChaosAddressCreatedData {
                chaos_address_id,
                domain_id,
                subdomain_id,
                local_part,
                response_code,
                created_at,
            },
        )]
    }

    pub fn enable(&self, at: DateTime<Utc>) -> Result<Vec<ChaosAddressEvent>, ChaosAddressError> {
        if self.is_enabled() {
            return Err(ChaosAddressError::AlreadyEnabled);
        }
        Ok(vec![ChaosAddressEvent::ChaosAddressEnabled(ToggledData {
            at,
        })])
    }

    pub fn disable(
        &self,
        at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<Vec<ChaosAddressEvent>, ChaosAddressError> {
        if !self.is_enabled() {
            return Err(ChaosAddressError::AlreadyDisabled);
        }
        Ok(vec![ChaosAddressEvent::ChaosAddressDisabled(
            ChaosAddressDisabledData { at, reason },
        )])
    }

    /// Records that a message was answered with the configured fault.
    ///
    /// Never fails: the SMTP reply has already gone out by the time this
    /// is called.
    pub fn record_receive(&self, received_at: DateTime<Utc>) -> Vec<ChaosAddressEvent> {
        vec![ChaosAddressEvent::ChaosAddressReceived(
            ChaosAddressReceivedData { received_at },
        )]
    }

    /// Applies a configuration edit, raising one event per changed field.
    ///
    /// Moving the address to another domain or subdomain after it has
    /// received traffic rejects the whole edit.
    pub fn edit(&self, edit: ChaosAddressEdit) -> Result<Vec<ChaosAddressEvent>, ChaosAddressError> {
        let domain_changed = edit.domain_id != self.domain_id;
        let subdomain_changed = edit.subdomain_id != self.subdomain_id;

        if (domain_changed || subdomain_changed) && self.received_count > 0 {
            return Err(ChaosAddressError::ImmutableAfterReceive {
                received: self.received_count,
            });
        }

        let mut events = Vec::new();
        if domain_changed {
            events.push(ChaosAddressEvent::ChaosAddressDomainChanged(
                DomainChangedData {
                    domain_id: edit.domain_id,
                },
            ));
        }
        if subdomain_changed {
            events.push(ChaosAddressEvent::ChaosAddressSubdomainChanged(
                SubdomainChangedData {
                    subdomain_id: edit.subdomain_id,
                },
            ));
        }
        if edit.local_part != self.local_part {
            events.push(ChaosAddressEvent::ChaosAddressLocalPartChanged(
                LocalPartChangedData {
                    local_part: edit.local_part,
                },
            ));
        }
        if Some(edit.response_code) != self.response_code {
            events.push(ChaosAddressEvent::ChaosAddressResponseCodeChanged(
                ResponseCodeChangedData {
                    response_code: edit.response_code,
                },
            ));
        }
        Ok(events)
    }

    /// Returns the current configuration as an edit, for building partial
    /// changes on top of it.
    pub fn current_config(&self) -> Option<ChaosAddressEdit> {
        Some(ChaosAddressEdit {
            domain_id: self.domain_id,
            subdomain_id: self.subdomain_id,
            local_part: self.local_part.clone(),
            response_code: self.response_code?,
        })
    }
}
