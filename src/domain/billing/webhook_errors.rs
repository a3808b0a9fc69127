//! Webhook verification errors.
//!
//! Every variant is fatal to the delivery: the request is answered with
//! 400 and the payload is never processed.

use thiserror::Error;

/// Errors that reject a webhook delivery before any processing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    /// No `stripe-signature` header on the request.
    #[error("Missing stripe-signature header")]
    MissingSignature,

    /// No v1 signature matched the payload.
    #[error("No signatures found matching the expected signature for payload")]
    InvalidSignature,

    /// Webhook timestamp is older than the tolerance window (5 minutes).
    #[error("Timestamp outside the tolerance zone")]
    TimestampOutOfRange,

    /// Event timestamp is in the future beyond clock skew tolerance.
    #[error("Timestamp is in the future")]
    InvalidTimestamp,

    /// Failed to parse the signature header or the JSON payload.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A test-mode event reached an endpoint that only accepts live mode.
    #[error("Test mode events are not accepted")]
    TestModeRejected,
}
