//! Stripe REST response envelopes.
//!
//! Only the envelopes live here; subscription and customer bodies
//! deserialize straight into the port types.

use serde::Deserialize;

/// List envelope (`{"object": "list", "data": [...]}`).
#[derive(Debug, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// Error envelope (`{"error": {...}}`).
#[derive(Debug, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

/// Hosted session (checkout or portal); `url` is always present for
/// sessions created by this service.
#[derive(Debug, Deserialize)]
pub struct StripeSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}
