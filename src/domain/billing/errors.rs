//! Billing-specific error types.
//!
//! Errors raised by the checkout, cancel, portal and read operations.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | MissingParameters | 400 |
//! | ValidationFailed | 400 |
//! | Forbidden | 403 |
//! | NotFound | 404 |
//! | Provider | 500 |
//! | Store | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Billing-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// One or more mandatory request fields were absent or blank.
    MissingParameters(Vec<&'static str>),

    /// A field was present but malformed.
    ValidationFailed { field: String, message: String },

    /// The caller may not act on the referenced resource.
    Forbidden(String),

    /// The billing provider does not know the referenced object.
    NotFound(String),

    /// The billing provider rejected or failed the call.
    Provider(String),

    /// The record store failed.
    Store(String),
}

impl BillingError {
    pub fn missing(fields: Vec<&'static str>) -> Self {
        BillingError::MissingParameters(fields)
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        BillingError::Forbidden(message.into())
    }

    pub fn provider(message: impl Into<String>) -> Self {
        BillingError::Provider(message.into())
    }

    /// Machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::MissingParameters(_) => "MISSING_PARAMETERS",
            BillingError::ValidationFailed { .. } => "VALIDATION_FAILED",
            BillingError::Forbidden(_) => "FORBIDDEN",
            BillingError::NotFound(_) => "NOT_FOUND",
            BillingError::Provider(_) => "PROVIDER_ERROR",
            BillingError::Store(_) => "STORE_ERROR",
        }
    }

    /// Message surfaced to the caller.
    ///
    /// Provider and store messages pass through verbatim; callers are the
    /// member-facing web client.
    pub fn message(&self) -> String {
        match self {
            BillingError::MissingParameters(fields) => {
                format!("Missing required parameters: {}", fields.join(", "))
            }
            BillingError::ValidationFailed { field, message } => {
                format!("Invalid '{}': {}", field, message)
            }
            BillingError::Forbidden(msg) => msg.clone(),
            BillingError::NotFound(msg) => msg.clone(),
            BillingError::Provider(msg) => msg.clone(),
            BillingError::Store(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for BillingError {}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => BillingError::ValidationFailed {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            _ => BillingError::Store(err.message),
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::EmptyField { field } => BillingError::ValidationFailed {
                field,
                message: "cannot be empty".to_string(),
            },
            ValidationError::InvalidFormat { field, reason } => BillingError::ValidationFailed {
                field,
                message: reason,
            },
        }
    }
}
