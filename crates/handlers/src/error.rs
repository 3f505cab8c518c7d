//! Handler error types.

use domain::DomainError;
use thiserror::Error;

use crate::outcome::FieldError;

/// Errors raised inside a handler before they are turned into a
/// [`CommandOutcome`](crate::CommandOutcome).
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Input was rejected before any aggregate was touched.
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// The caller cancelled the command.
    #[error("Operation was cancelled")]
    Cancelled,

    /// Every attempt at saving the capture hit a concurrent writer.
    #[error("Capture was not saved after {attempts} conflicting attempt(s)")]
    CaptureConflict { attempts: u32 },

    /// Domain error.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl HandlerError {
    /// Builds a validation failure on a single field.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        HandlerError::Validation(vec![FieldError::new(field, message)])
    }
}

/// Convenience type alias for handler results.
pub type Result<T> = std::result::Result<T, HandlerError>;
