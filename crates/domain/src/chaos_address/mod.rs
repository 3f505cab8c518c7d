//! Chaos addresses: mailboxes that answer with a configured SMTP fault
//! instead of accepting mail.

mod aggregate;
mod events;

pub use aggregate::{ChaosAddress, ChaosAddressEdit, ToggleKind};
pub use events::{
    ChaosAddressCreatedData, ChaosAddressDisabledData, ChaosAddressEvent, ChaosAddressReceivedData, DomainChangedData,
    LocalPartChangedData, ResponseCodeChangedData, SubdomainChangedData, ToggledData,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during chaos address operations.
#[derive(Debug, Error)]
pub enum ChaosAddressError {
    #[error("Chaos address is already enabled")]
    AlreadyEnabled,

    #[error("Chaos address is already disabled")]
    AlreadyDisabled,

    /// Ownership can no longer change once traffic has been observed.
    #[error("Chaos address has received {received} message(s); its domain and subdomain are locked")]
    ImmutableAfterReceive { received: u64 },
}

/// An SMTP reply code in the transient (4xx) or permanent (5xx) failure range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct SmtpResponseCode(u16);

impl SmtpResponseCode {
    pub const MIN: u16 = 400;
    pub const MAX: u16 = 599;

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns true for 4xx codes, which tell the sender to retry later.
    pub fn is_transient(&self) -> bool {
        self.0 < 500
    }
}

impl TryFrom<u16> for SmtpResponseCode {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&code) {
            Ok(Self(code))
        } else {
            Err(format!(
                "SMTP response code {code} is outside {}..={}",
                Self::MIN,
                Self::MAX
            ))
        }
    }
}

impl From<SmtpResponseCode> for u16 {
    fn from(code: SmtpResponseCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for SmtpResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
