//! In-memory adapters for tests and local development.

mod billing_provider;
mod record_store;

pub use billing_provider::{InMemoryBillingProvider, RecordedCheckout};
pub use record_store::InMemoryRecordStore;
