//! Caller-facing command results.

use std::fmt;

use domain::{CampaignError, ChaosAddressError, DomainError, EmailError, SubdomainError};
use event_store::EventStoreError;
use serde::{Deserialize, Serialize};

use crate::error::HandlerError;

/// Machine-readable reason a command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    AlreadyEnabled,
    AlreadyDisabled,
    ImmutableChaosAddress,
    AlreadySuspended,
    NotSuspended,
    CampaignAlreadyDeleted,
    InvalidCampaignData,
    AlreadyFavorited,
    NotFavorited,
    EmailAlreadyDeleted,
    SavingChangesFailed,
    Cancelled,
    Internal,
}

impl ErrorCode {
    /// Returns the stable snake_case name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not_found",
            ErrorCode::AlreadyEnabled => "already_enabled",
            ErrorCode::AlreadyDisabled => "already_disabled",
            ErrorCode::ImmutableChaosAddress => "immutable_chaos_address",
            ErrorCode::AlreadySuspended => "already_suspended",
            ErrorCode::NotSuspended => "not_suspended",
            ErrorCode::CampaignAlreadyDeleted => "campaign_already_deleted",
            ErrorCode::InvalidCampaignData => "invalid_campaign_data",
            ErrorCode::AlreadyFavorited => "already_favorited",
            ErrorCode::NotFavorited => "not_favorited",
            ErrorCode::EmailAlreadyDeleted => "email_already_deleted",
            ErrorCode::SavingChangesFailed => "saving_changes_failed",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&DomainError> for ErrorCode {
    fn from(error: &DomainError) -> Self {
        match error {
            DomainError::AggregateNotFound { .. } => ErrorCode::NotFound,
            DomainError::EventStore(EventStoreError::Serialization(_)) => ErrorCode::Internal,
            DomainError::EventStore(_) => ErrorCode::SavingChangesFailed,
            DomainError::ChaosAddress(e) => match e {
                ChaosAddressError::AlreadyEnabled => ErrorCode::AlreadyEnabled,
                ChaosAddressError::AlreadyDisabled => ErrorCode::AlreadyDisabled,
                ChaosAddressError::ImmutableAfterReceive { .. } => {
                    ErrorCode::ImmutableChaosAddress
                }
            },
            DomainError::Campaign(e) => match e {
                CampaignError::InvalidCampaignData(_) => ErrorCode::InvalidCampaignData,
                CampaignError::CampaignAlreadyDeleted => ErrorCode::CampaignAlreadyDeleted,
            },
            DomainError::Email(e) => match e {
                EmailError::AlreadyFavorited => ErrorCode::AlreadyFavorited,
                EmailError::NotFavorited => ErrorCode::NotFavorited,
                EmailError::AlreadyDeleted => ErrorCode::EmailAlreadyDeleted,
            },
            DomainError::Subdomain(e) => match e {
                SubdomainError::AlreadySuspended => ErrorCode::AlreadySuspended,
                SubdomainError::NotSuspended => ErrorCode::NotSuspended,
            },
        }
    }
}

/// A rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of a command as seen by its caller.
///
/// Handlers never return `Err`; every failure ends up in one of the two
/// failure variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome<T> {
    Succeeded(T),
    Failed { code: ErrorCode, message: String },
    ValidationFailed(Vec<FieldError>),
}

impl<T> CommandOutcome<T> {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, CommandOutcome::Succeeded(_))
    }

    /// Returns the failure code, if the command failed after validation.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            CommandOutcome::Failed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns the success value, discarding any failure.
    pub fn succeeded(self) -> Option<T> {
        match self {
            CommandOutcome::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CommandOutcome<U> {
        match self {
            CommandOutcome::Succeeded(value) => CommandOutcome::Succeeded(f(value)),
            CommandOutcome::Failed { code, message } => CommandOutcome::Failed { code, message },
            CommandOutcome::ValidationFailed(errors) => CommandOutcome::ValidationFailed(errors),
        }
    }

    fn failed(code: ErrorCode, message: impl Into<String>) -> Self {
        CommandOutcome::Failed {
            code,
            message: message.into(),
        }
    }
}

impl<T> From<HandlerError> for CommandOutcome<T> {
    fn from(error: HandlerError) -> Self {
        let message = error.to_string();
        match error {
            HandlerError::Validation(errors) => CommandOutcome::ValidationFailed(errors),
            HandlerError::Cancelled => Self::failed(ErrorCode::Cancelled, message),
            HandlerError::CaptureConflict { .. } => {
                Self::failed(ErrorCode::SavingChangesFailed, message)
            }
            HandlerError::Domain(e) => Self::failed(ErrorCode::from(&e), message),
        }
    }
}

impl<T> From<Result<T, HandlerError>> for CommandOutcome<T> {
    fn from(result: Result<T, HandlerError>) -> Self {
        match result {
            Ok(value) => CommandOutcome::Succeeded(value),
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use event_store::Version;

    #[test]
    fn codes_render_as_snake_case() {
        assert_eq!(ErrorCode::ImmutableChaosAddress.to_string(), "immutable_chaos_address");
        assert_eq!(
            serde_json::to_string(&ErrorCode::SavingChangesFailed).unwrap(),
            "\"saving_changes_failed\""
        );
    }

    #[test]
    fn not_found_maps_to_not_found() {
        let error = DomainError::AggregateNotFound {
            aggregate_type: "Campaign",
            aggregate_id: AggregateId::new(),
        };
        assert_eq!(ErrorCode::from(&error), ErrorCode::NotFound);
    }

    #[test]
    fn store_conflict_maps_to_saving_changes_failed() {
        let error = DomainError::EventStore(EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::initial(),
            actual: Version::first(),
        });
        let outcome: CommandOutcome<()> = HandlerError::from(error).into();
        assert_eq!(outcome.error_code(), Some(ErrorCode::SavingChangesFailed));
    }

    #[test]
    fn domain_rules_keep_their_own_codes() {
        let error = DomainError::from(ChaosAddressError::ImmutableAfterReceive { received: 2 });
        assert_eq!(ErrorCode::from(&error), ErrorCode::ImmutableChaosAddress);

        let error = DomainError::from(EmailError::AlreadyDeleted);
        assert_eq!(ErrorCode::from(&error), ErrorCode::EmailAlreadyDeleted);
    }

    #[test]
    fn validation_errors_become_validation_failed() {
        let result: Result<(), HandlerError> = Err(HandlerError::invalid("local_part", "required"));
        let outcome = CommandOutcome::from(result);
        assert_eq!(
            outcome,
            CommandOutcome::ValidationFailed(vec![FieldError::new("local_part", "required")])
        );
        assert_eq!(outcome.error_code(), None);
    }

    #[test]
    fn map_keeps_failures() {
        let outcome: CommandOutcome<u8> = HandlerError::Cancelled.into();
        assert_eq!(outcome.map(|v| v + 1).error_code(), Some(ErrorCode::Cancelled));
        assert_eq!(CommandOutcome::Succeeded(1).map(|v| v + 1).succeeded(), Some(2));
    }
}
