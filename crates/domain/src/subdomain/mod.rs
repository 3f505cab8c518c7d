//! Subdomains and their suspension history.

mod aggregate;
mod events;

pub use aggregate::{Subdomain, SuspensionKind};
pub use events::{
    SubdomainEvent, SubdomainRegisteredData, SubdomainSuspendedData, SubdomainUnsuspendedData,
};

use thiserror::Error;

/// Errors that can occur during subdomain operations.
#[derive(Debug, Error)]
pub enum SubdomainError {
    #[error("Subdomain is already suspended")]
    AlreadySuspended,

    #[error("Subdomain is not suspended")]
    NotSuspended,
}
