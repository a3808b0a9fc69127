//! HTTP adapters - REST API implementations.

pub mod billing;
mod router;

pub use billing::{BillingApiError, BillingAppState};
pub use router::app_router;
