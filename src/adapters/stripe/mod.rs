//! Stripe billing provider adapter.
//!
//! Implements the `BillingProvider` port against the Stripe REST API:
//! - Customers (idempotent creation)
//! - Checkout and billing portal sessions
//! - Subscription reads and cancel-at-period-end
//!
//! Webhook verification is pure and lives in `domain::billing`.
//!
//! # Security
//!
//! The secret key is held as `secrecy::SecretString` and only exposed when
//! building the basic-auth header.

mod api_types;
mod billing_provider;

pub use billing_provider::{StripeBillingProvider, StripeConfig};
