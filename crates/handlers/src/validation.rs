//! Input checks run before any aggregate is loaded.

use domain::{MAX_CAMPAIGN_VALUE_LEN, SmtpResponseCode};

use crate::error::HandlerError;
use crate::outcome::FieldError;

/// Longest accepted local part, in characters.
pub const MAX_LOCAL_PART_LEN: usize = 64;

/// Longest accepted subdomain label, in characters.
pub const MAX_SUBDOMAIN_NAME_LEN: usize = 63;

/// Collects field errors so one response reports every bad field.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn reject(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Rejects a nil identifier.
    pub fn required_id(&mut self, field: &'static str, is_nil: bool) -> &mut Self {
        if is_nil {
            self.reject(field, "is required");
        }
        self
    }

    pub fn local_part(&mut self, field: &'static str, value: &str) -> &mut Self {
        if value.is_empty() {
            self.reject(field, "is required");
        } else if value.chars().count() > MAX_LOCAL_PART_LEN {
            self.reject(field, format!("must be at most {MAX_LOCAL_PART_LEN} characters"));
        } else if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
        {
            self.reject(field, "may only contain letters, digits, '.', '_', '+' and '-'");
        }
        self
    }

    pub fn response_code(&mut self, field: &'static str, code: u16) -> &mut Self {
        if let Err(message) = SmtpResponseCode::try_from(code) {
            self.reject(field, message);
        }
        self
    }

    pub fn campaign_value(&mut self, field: &'static str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.reject(field, "is required");
        } else if value.chars().count() > MAX_CAMPAIGN_VALUE_LEN {
            self.reject(
                field,
                format!("must be at most {MAX_CAMPAIGN_VALUE_LEN} characters"),
            );
        }
        self
    }

    pub fn subdomain_name(&mut self, field: &'static str, value: &str) -> &mut Self {
        if value.is_empty() {
            self.reject(field, "is required");
        } else if value.chars().count() > MAX_SUBDOMAIN_NAME_LEN {
            self.reject(
                field,
                format!("must be at most {MAX_SUBDOMAIN_NAME_LEN} characters"),
            );
        }
        self
    }

    /// Fails with every collected field error, if any.
    pub fn finish(&mut self) -> Result<(), HandlerError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(HandlerError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

/// Converts a code that already passed [`Validator::response_code`].
pub(crate) fn parse_response_code(
    field: &'static str,
    code: u16,
) -> Result<SmtpResponseCode, HandlerError> {
    SmtpResponseCode::try_from(code).map_err(|message| HandlerError::invalid(field, message))
}
