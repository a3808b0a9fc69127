//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Billing Provider
//!
//! - `BillingProvider` - customers, checkout, subscriptions, portal
//!
//! ## Record Store
//!
//! - `ProfileRepository` - member profiles and their customer link
//! - `CustomerRepository` - user ↔ provider customer mapping
//! - `SubscriptionRepository` - mirrored subscriptions

mod billing_provider;
mod customer_repository;
mod profile_repository;
mod subscription_repository;

pub use billing_provider::{
    is_object_id, BillingProvider, CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest,
    Customer, PortalSession, Price, Product, ProductRef, ProviderError, ProviderErrorCode,
    ProviderSubscription, SubscriptionItem, SubscriptionItems,
};
pub use customer_repository::CustomerRepository;
pub use profile_repository::ProfileRepository;
pub use subscription_repository::SubscriptionRepository;
