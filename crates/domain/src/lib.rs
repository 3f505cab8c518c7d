//! Domain layer for the disposable-mail service.
//!
//! This crate provides:
//! - `Aggregate`/`DomainEvent` traits and `AggregateRoot` (raise, replay)
//! - `Repository` for loading and saving aggregates with optimistic concurrency
//! - The aggregates: chaos addresses, campaigns, emails and subdomains
//! - An append-only `AuditTrail` for derived toggle state, and a `Clock`

pub mod aggregate;
pub mod audit;
pub mod campaign;
pub mod chaos_address;
pub mod clock;
pub mod email;
pub mod error;
pub mod repository;
pub mod subdomain;

pub use aggregate::{Aggregate, AggregateRoot, DomainEvent};
pub use audit::{AuditEntry, AuditTrail};
pub use campaign::{
    Campaign, CampaignError, CampaignEvent, MAX_CAMPAIGN_VALUE_LEN, derive_campaign_id,
};
pub use chaos_address::{
    ChaosAddress, ChaosAddressEdit, ChaosAddressError, ChaosAddressEvent, SmtpResponseCode,
    ToggleKind,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use email::{DeletionReason, Email, EmailError, EmailEvent, ReceivedEmail};
pub use error::DomainError;
pub use repository::Repository;
pub use subdomain::{Subdomain, SubdomainError, SubdomainEvent, SuspensionKind};
