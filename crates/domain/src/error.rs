//! Failures surfaced by aggregates and repositories.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

use crate::campaign::CampaignError;
use crate::chaos_address::ChaosAddressError;
use crate::email::EmailError;
use crate::subdomain::SubdomainError;

/// Everything a command can fail with once it has passed validation.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error("chaos address rejected the command: {0}")]
    ChaosAddress(#[from] ChaosAddressError),

    #[error("campaign rejected the command: {0}")]
    Campaign(#[from] CampaignError),

    #[error("email rejected the command: {0}")]
    Email(#[from] EmailError),

    #[error("subdomain rejected the command: {0}")]
    Subdomain(#[from] SubdomainError),

    /// `Repository::get` found an empty stream.
    #[error("no {aggregate_type} stream with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },
}

impl DomainError {
    /// True when the store refused the save because the stream moved on.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::EventStore(e) if e.is_conflict())
    }
}
