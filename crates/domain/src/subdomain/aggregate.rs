//! Subdomain aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, DomainId, SubdomainId};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::audit::{AuditEntry, AuditTrail};

use super::{
    SubdomainError, SubdomainEvent,
    events::{SubdomainRegisteredData, SubdomainSuspendedData, SubdomainUnsuspendedData},
};

/// Kind of an entry in a subdomain's suspension history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspensionKind {
    Suspend,
    Unsuspend,
}

/// Subdomain aggregate root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subdomain {
    id: Option<SubdomainId>,
    domain_id: Option<DomainId>,
    name: String,
    registered_at: Option<DateTime<Utc>>,
    suspensions: AuditTrail<SuspensionKind>,
}

impl Aggregate for Subdomain {
    type Event = SubdomainEvent;
    type Error = SubdomainError;

    fn aggregate_type() -> &'static str {
        "Subdomain"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id.map(AggregateId::from)
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            SubdomainEvent::SubdomainRegistered(data) => {
                self.id = Some(data.subdomain_id);
                self.domain_id = Some(data.domain_id);
                self.name = data.name;
                self.registered_at = Some(data.registered_at);
            }
            SubdomainEvent::SubdomainSuspended(data) => {
                self.suspensions
                    .record_with_reason(SuspensionKind::Suspend, data.at, data.reason);
            }
            SubdomainEvent::SubdomainUnsuspended(data) => {
                self.suspensions.record(SuspensionKind::Unsuspend, data.at);
            }
        }
    }
}

// Query methods
impl Subdomain {
    pub fn subdomain_id(&self) -> Option<SubdomainId> {
        self.id
    }

    pub fn domain_id(&self) -> Option<DomainId> {
        self.domain_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }

    /// True when the chronologically last suspension entry is a suspend.
    pub fn is_suspended(&self) -> bool {
        self.suspensions.current() == Some(SuspensionKind::Suspend)
    }

    /// Returns the reason of the suspension currently in force.
    pub fn suspension_reason(&self) -> Option<&str> {
        self.suspensions
            .latest()
            .filter(|entry| entry.kind == SuspensionKind::Suspend)
            .and_then(|entry| entry.reason.as_deref())
    }

    pub fn suspension_history(&self) -> &[AuditEntry<SuspensionKind>] {
        self.suspensions.entries()
    }
}

// Command methods (return events)
impl Subdomain {
    pub fn register(
        subdomain_id: SubdomainId,
        domain_id: DomainId,
        name: String,
        registered_at: DateTime<Utc>,
    ) -> Vec<SubdomainEvent> {
        vec![SubdomainEvent::SubdomainRegistered(
            SubdomainRegisteredData {
                subdomain_id,
                domain_id,
                name,
                registered_at,
            },
        )]
    }

    pub fn suspend(
        &self,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Vec<SubdomainEvent>, SubdomainError> {
        if self.is_suspended() {
            return Err(SubdomainError::AlreadySuspended);
        }
        Ok(vec![SubdomainEvent::SubdomainSuspended(
            SubdomainSuspendedData { at, reason },
        )])
    }

    pub fn unsuspend(&self, at: DateTime<Utc>) -> Result<Vec<SubdomainEvent>, SubdomainError> {
        if !self.is_suspended() {
            return Err(SubdomainError::NotSuspended);
        }
        Ok(vec![SubdomainEvent::SubdomainUnsuspended(
            SubdomainUnsuspendedData { at },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregateRoot;
    use chrono::Duration;

    fn registered() -> AggregateRoot<Subdomain> {
        let mut root : AggregateRoot<Subdomain> = AggregateRoot::new();
        root.raise_all(Subdomain::register(
            SubdomainId::new(),
            DomainId::new(),
            "qa".to_string(),
            Utc::now(),
        ));
        root
    }

    #[test]
    fn suspend_and_unsuspend_are_strict() {
        let mut root = registered();
        let t0 = Utc::now();

        assert!(matches!(root.unsuspend(t0), Err(SubdomainError::NotSuspended)));
        root.execute(|s| s.suspend(Some("abuse report".into()), t0))
            .unwrap();
        assert!(root.is_suspended());
        assert_eq!(root.suspension_reason(), Some("abuse report"));
        assert!(matches!(
            root.suspend(None, t0 + Duration::seconds(1)),
            Err(SubdomainError::AlreadySuspended)
        ));

        root.execute(|s| s.unsuspend(t0 + Duration::seconds(2)))
            .unwrap();
        assert!(!root.is_suspended());
        assert_eq!(root.suspension_reason(), None);
        assert_eq!(root.suspension_history().len(), 2);
    }

    #[test]
    fn suspension_follows_timestamps_not_append_order() {
        let mut root = registered();
        let t0 = Utc::now();

        // Suspended at t0+10m, then an unsuspend stamped earlier arrives.
        root.raise(SubdomainEvent::SubdomainSuspended(SubdomainSuspendedData {
            at: t0 + Duration::minutes(10),
            reason: None,
        }));
        root.raise(SubdomainEvent::SubdomainUnsuspended(
            SubdomainUnsuspendedData { at: t0 },
        ));

        assert!(root.is_suspended());
    }
}
