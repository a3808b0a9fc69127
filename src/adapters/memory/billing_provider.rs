//! In-memory billing provider.
//!
//! Stands in for Stripe in tests and local development. Supports:
//! - Idempotent customer creation keyed on the idempotency key
//! - Seeded subscriptions, shaped like Stripe's responses (list reads
//!   carry the product as a bare id)
//! - Error injection
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::ports::{
    BillingProvider, CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer,
    PortalSession, Price, Product, ProductRef, ProviderError, ProviderSubscription,
    SubscriptionItem, SubscriptionItems,
};

/// In-memory billing provider.
#[derive(Default, Clone)]
pub struct InMemoryBillingProvider {
    inner: Arc<Mutex<ProviderState>>,
}

#[derive(Default)]
struct ProviderState {
    customers: Vec<Customer>,
    idempotency: HashMap<String, String>,
    subscriptions: HashMap<String, ProviderSubscription>,
    checkouts: Vec<RecordedCheckout>,
    portal_sessions: Vec<(String, String)>,
    next_error: Option<ProviderError>,
    customer_create_calls: usize,
    sequence: u64,
}

/// Checkout request as received, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCheckout {
    pub session_id: String,
    pub customer_id: String,
    pub price_id: String,
    pub user_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl InMemoryBillingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ProviderState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_error(&self) -> Result<(), ProviderError> {
        match self.state().next_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration
    // ════════════════════════════════════════════════════════════════════════════

    /// Fail the next call with `error`.
    pub fn fail_next(&self, error: ProviderError) {
        self.state().next_error = Some(error);
    }

    /// Seed or replace a subscription.
    pub fn put_subscription(&self, subscription: ProviderSubscription) {
        self.state()
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    /// Distinct customers created.
    pub fn customers(&self) -> Vec<Customer> {
        self.state().customers.clone()
    }

    /// Number of `create_customer` calls, including idempotent replays.
    pub fn customer_create_calls(&self) -> usize {
        self.state().customer_create_calls
    }

    pub fn checkouts(&self) -> Vec<RecordedCheckout> {
        self.state().checkouts.clone()
    }

    /// `(customer_id, return_url)` of every portal session created.
    pub fn portal_sessions(&self) -> Vec<(String, String)> {
        self.state().portal_sessions.clone()
    }

    pub fn subscription(&self, id: &str) -> Option<ProviderSubscription> {
        self.state().subscriptions.get(id).cloned()
    }

    /// Builds an active monthly subscription for one product.
    pub fn active_subscription(
        id: &str,
        customer_id: &str,
        product_name: &str,
        tier_tag: Option<&str>,
        created: i64,
    ) -> ProviderSubscription {
        let metadata = tier_tag
            .map(|tier| HashMap::from([("tier".to_string(), tier.to_string())]))
            .unwrap_or_default();

        ProviderSubscription {
            id: id.to_string(),
            customer: customer_id.to_string(),
            status: "active".to_string(),
            cancel_at_period_end: false,
            current_period_start: Some(created),
            current_period_end: Some(created + 30 * 24 * 60 * 60),
            created,
            metadata: HashMap::new(),
            items: SubscriptionItems {
                data: vec![SubscriptionItem {
                    id: format!("si_{}", id),
                    price: Price {
                        id: format!("price_{}", id),
                        product: ProductRef::Expanded(Product {
                            id: format!("prod_{}", id),
                            name: Some(product_name.to_string()),
                            metadata,
                        }),
                    },
                    current_period_start: None,
                    current_period_end: None,
                }],
            },
        }
    }
}

/// List reads expand down to the price only.
fn collapse_products(mut subscription: ProviderSubscription) -> ProviderSubscription {
    for item in &mut subscription.items.data {
        if let ProductRef::Expanded(product) = &item.price.product {
            item.price.product = ProductRef::Id(product.id.clone());
        }
    }
    subscription
}

#[async_trait]
impl BillingProvider for InMemoryBillingProvider {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, ProviderError> {
        self.take_error()?;
        let mut state = self.state();
        state.customer_create_calls += 1;

        if let Some(existing) = state.idempotency.get(&request.idempotency_key).cloned() {
            if let Some(customer) = state.customers.iter().find(|c| c.id == existing) {
                return Ok(customer.clone());
            }
        }

        state.sequence += 1;
        let customer = Customer {
            id: format!("cus_mem_{:04}", state.sequence),
            email: request.email,
        };
        state
            .idempotency
            .insert(request.idempotency_key, customer.id.clone());
        state.customers.push(customer.clone());
        Ok(customer)
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, ProviderError> {
        self.take_error()?;
        let mut state = self.state();
        state.sequence += 1;
        let session_id = format!("cs_mem_{:04}", state.sequence);

        state.checkouts.push(RecordedCheckout {
            session_id: session_id.clone(),
            customer_id: request.customer_id,
            price_id: request.price_id,
            user_id: request.user_id.to_string(),
            success_url: request.success_url,
            cancel_url: request.cancel_url,
        });

        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.test/c/pay/{}", session_id),
            id: session_id,
        })
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProviderSubscription, ProviderError> {
        self.take_error()?;
        self.state()
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| {
                ProviderError::not_found(format!("No such subscription: '{}'", subscription_id))
            })
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ProviderSubscription>, ProviderError> {
        self.take_error()?;
        let mut subscriptions: Vec<ProviderSubscription> = self
            .state()
            .subscriptions
            .values()
            .filter(|s| s.customer == customer_id)
            .cloned()
            .map(collapse_products)
            .collect();
        subscriptions.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(subscriptions)
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, ProviderError> {
        self.take_error()?;
        let mut state = self.state();
        state.sequence += 1;
        let id = format!("bps_mem_{:04}", state.sequence);
        state
            .portal_sessions
            .push((customer_id.to_string(), return_url.to_string()));

        Ok(PortalSession {
            url: format!("https://billing.stripe.test/p/session/{}", id),
            id,
        })
    }

    async fn cancel_at_period_end(
        &self,
        subscription_id: &str,
    ) -> Result<ProviderSubscription, ProviderError> {
        self.take_error()?;
        let mut state = self.state();
        let subscription = state.subscriptions.get_mut(subscription_id).ok_or_else(|| {
            ProviderError::not_found(format!("No such subscription: '{}'", subscription_id))
        })?;
        subscription.cancel_at_period_end = true;
        Ok(subscription.clone())
    }
}
