//! Billing domain - subscription mirror, tiers and entitlements.
//!
//! # Module Organization
//!
//! - `tier` / `tier_resolver` - ordered membership tiers and product mapping
//! - `status` - closed set of mirrored subscription statuses
//! - `subscription` - mirrored record, snapshots and the version guard
//! - `customer` - profile and billing-customer links
//! - `entitlement` - pure access decisions
//! - `stripe_event` / `webhook_verifier` / `webhook_errors` - inbound events

mod customer;
mod entitlement;
mod errors;
mod status;
mod stripe_event;
mod subscription;
mod tier;
mod tier_resolver;
mod webhook_errors;
mod webhook_verifier;

pub use customer::{customer_idempotency_key, CustomerRecord, ProfileRecord};
pub use entitlement::{has_access, Entitlements};
pub use errors::BillingError;
pub use status::SubscriptionStatus;
pub use stripe_event::{
    CheckoutSessionObject, InvoiceObject, StripeEvent, StripeEventData, StripeEventType,
};
pub use subscription::{StatusChange, SubscriptionRecord, SubscriptionSnapshot, UpsertOutcome};
pub use tier::MembershipTier;
pub use tier_resolver::{derive_tier, TIER_METADATA_KEY};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{generate_signature_header, SignatureHeader, WebhookVerifier};

#[cfg(test)]
pub(crate) use stripe_event::StripeEventBuilder;
#[cfg(test)]
pub(crate) use subscription::test_support;
