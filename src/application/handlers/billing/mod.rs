//! Billing handlers.
//!
//! ## Commands
//! - Creating checkout sessions (with lazy customer provisioning)
//! - Processing provider webhooks
//! - Cancelling at period end
//! - Opening the billing portal
//!
//! ## Queries
//! - Current provider subscription for a member
//! - Member entitlements

mod cancel_subscription;
mod check_entitlement;
mod create_checkout_session;
mod create_portal_session;
mod customer_lock;
mod get_subscription;
mod handle_billing_webhook;
mod reconcile_subscription;

// Commands
pub use cancel_subscription::{CancelSubscriptionCommand, CancelSubscriptionHandler};
pub use create_checkout_session::{
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler, CreateCheckoutSessionResult,
};
pub use create_portal_session::{CreatePortalSessionCommand, CreatePortalSessionHandler};
pub use handle_billing_webhook::{
    DropReason, HandleBillingWebhookCommand, HandleBillingWebhookHandler, WebhookOutcome,
};

// Queries
pub use check_entitlement::{CheckEntitlementHandler, CheckEntitlementQuery, CheckEntitlementResult};
pub use get_subscription::{GetSubscriptionHandler, GetSubscriptionQuery};

// Shared
pub use customer_lock::KeyedLocks;
pub use reconcile_subscription::SubscriptionReconciler;
