//! HTTP adapter for billing endpoints.
//!
//! Exposes checkout, subscription reads, cancellation, the billing portal,
//! entitlements and the provider webhook. See [`routes::billing_routes`].

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{BillingApiError, BillingAppState, SIGNATURE_HEADER};
pub use routes::billing_routes;
