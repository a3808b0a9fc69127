//! Billing provider port.
//!
//! The provider (Stripe) owns customers, subscriptions and invoices and is
//! the source of truth for subscription state. `ProviderSubscription` is a
//! typed projection of the provider's subscription object: field names match
//! the provider's, but only the fields billing reads are kept. Anything else
//! the provider sends (`trial_end`, `latest_invoice`, `plan`, ...) is dropped
//! on decode and never reaches the web client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::billing::BillingError;
use crate::domain::foundation::UserId;

/// Port for billing provider operations.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a customer.
    ///
    /// The idempotency key makes repeated calls for the same user return the
    /// same customer.
    async fn create_customer(&self, request: CreateCustomerRequest)
        -> Result<Customer, ProviderError>;

    /// Create a subscription-mode hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, ProviderError>;

    /// Retrieve a subscription with its price and product expanded.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProviderSubscription, ProviderError>;

    /// List a customer's subscriptions in every status, newest first.
    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ProviderSubscription>, ProviderError>;

    /// Create a self-service billing portal session.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, ProviderError>;

    /// Schedule cancellation at the end of the current period.
    async fn cancel_at_period_end(
        &self,
        subscription_id: &str,
    ) -> Result<ProviderSubscription, ProviderError>;
}

/// Whether `id` has the shape of a provider object id (`sub_...`, `cus_...`).
///
/// Ids are interpolated into request paths, so anything outside
/// `[A-Za-z0-9_]` is refused before a request is built.
pub fn is_object_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Request to create a customer.
#[derive(Debug, Clone)]
pub struct CreateCustomerRequest {
    pub user_id: UserId,
    pub email: Option<String>,
    pub idempotency_key: String,
}

/// Customer as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Request to create a checkout session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutRequest {
    pub customer_id: String,
    pub price_id: String,
    /// Embedded as the cross-reference field and in metadata so the
    /// webhook can attribute the purchase.
    pub user_id: UserId,
    pub success_url: String,
    pub cancel_url: String,
}

/// Hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Billing portal session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

/// Subscription as projected from the provider's object.
///
/// Serializes with the provider's snake_case field names. Fields not listed
/// here are not carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub items: SubscriptionItems,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionItem {
    pub id: String,
    pub price: Price,
    /// Newer API versions report the billing period per item.
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub id: String,
    pub product: ProductRef,
}

/// A product reference: expanded object or bare id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
    Expanded(Product),
    Id(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProviderSubscription {
    /// Product of the first line item, when expanded.
    pub fn primary_product(&self) -> Option<&Product> {
        match &self.items.data.first()?.price.product {
            ProductRef::Expanded(product) => Some(product),
            ProductRef::Id(_) => None,
        }
    }

    /// Start of the current period, falling back to the first item.
    pub fn period_start(&self) -> Option<i64> {
        self.current_period_start
            .or_else(|| self.items.data.first()?.current_period_start)
    }

    /// End of the current period, falling back to the first item.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end
            .or_else(|| self.items.data.first()?.current_period_end)
    }
}

/// Billing provider error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// Error code for categorization.
    pub code: ProviderErrorCode,

    /// Human-readable message, passed through to callers.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl ProviderError {
    /// Create a new provider error.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    /// Create with provider code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ProviderError {}

impl From<ProviderError> for BillingError {
    fn from(err: ProviderError) -> Self {
        match err.code {
            ProviderErrorCode::NotFound => BillingError::NotFound(err.message),
            _ => BillingError::Provider(err.message),
        }
    }
}

/// Provider error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// API authentication failed.
    AuthenticationError,

    /// Request rejected as invalid (bad price id, missing field).
    InvalidRequest,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Response could not be decoded.
    InvalidResponse,

    /// Any other provider-side failure.
    ProviderError,
}

impl ProviderErrorCode {
    /// Maps an HTTP status returned by the provider.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 402 | 409 => ProviderErrorCode::InvalidRequest,
            401 | 403 => ProviderErrorCode::AuthenticationError,
            404 => ProviderErrorCode::NotFound,
            429 => ProviderErrorCode::RateLimitExceeded,
            _ => ProviderErrorCode::ProviderError,
        }
    }

    /// Check if this error type is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderErrorCode::NetworkError
                | ProviderErrorCode::RateLimitExceeded
                | ProviderErrorCode::ProviderError
        )
    }
}

impl std::fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderErrorCode::NetworkError => "network_error",
            ProviderErrorCode::AuthenticationError => "authentication_error",
            ProviderErrorCode::InvalidRequest => "invalid_request",
            ProviderErrorCode::NotFound => "not_found",
            ProviderErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            ProviderErrorCode::InvalidResponse => "invalid_response",
            ProviderErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expanded_subscription() -> serde_json::Value {
        json!({
            "id": "sub_1",
            "object": "subscription",
            "customer": "cus_1",
            "status": "active",
            "cancel_at_period_end": false,
            "current_period_start": 1700000000,
            "current_period_end": 1702592000,
            "created": 1700000000,
            "items": {
                "object": "list",
                "data": [{
                    "id": "si_1",
                    "price": {
                        "id": "price_123",
                        "product": {
                            "id": "prod_1",
                            "name": "Aspiring Monthly",
                            "metadata": {"tier": "aspiring"}
                        }
                    }
                }]
            }
        })
    }

    #[test]
    fn deserializes_expanded_product() {
        let sub: ProviderSubscription = serde_json::from_value(expanded_subscription()).unwrap();
        let product = sub.primary_product().unwrap();
        assert_eq!(product.name.as_deref(), Some("Aspiring Monthly"));
        assert_eq!(product.metadata.get("tier").map(String::as_str), Some("aspiring"));
        assert_eq!(sub.period_start(), Some(1_700_000_000));
    }

    #[test]
    fn unexpanded_product_is_not_primary() {
        let mut raw = expanded_subscription();
        raw["items"]["data"][0]["price"]["product"] = json!("prod_1");
        let sub: ProviderSubscription = serde_json::from_value(raw).unwrap();
        assert!(sub.primary_product().is_none());
        assert_eq!(
            sub.items.data[0].price.product,
            ProductRef::Id("prod_1".to_string())
        );
    }

    #[test]
    fn period_falls_back_to_first_item() {
        let mut raw = expanded_subscription();
        raw.as_object_mut().unwrap().remove("current_period_start");
        raw.as_object_mut().unwrap().remove("current_period_end");
        raw["items"]["data"][0]["current_period_start"] = json!(1710000000);
        raw["items"]["data"][0]["current_period_end"] = json!(1712592000);
        let sub: ProviderSubscription = serde_json::from_value(raw).unwrap();
        assert_eq!(sub.period_start(), Some(1_710_000_000));
        assert_eq!(sub.period_end(), Some(1_712_592_000));
    }

    #[test]
    fn error_codes_from_status() {
        assert_eq!(ProviderErrorCode::from_status(404), ProviderErrorCode::NotFound);
        assert_eq!(ProviderErrorCode::from_status(400), ProviderErrorCode::InvalidRequest);
        assert_eq!(ProviderErrorCode::from_status(401), ProviderErrorCode::AuthenticationError);
        assert_eq!(ProviderErrorCode::from_status(429), ProviderErrorCode::RateLimitExceeded);
        assert_eq!(ProviderErrorCode::from_status(503), ProviderErrorCode::ProviderError);
    }

    #[test]
    fn retryable_follows_code() {
        assert!(ProviderError::network("timeout").retryable);
        assert!(!ProviderError::not_found("gone").retryable);
    }

    #[test]
    fn converts_to_billing_error() {
        let err: BillingError = ProviderError::not_found("No such subscription: 'sub_x'").into();
        assert_eq!(err, BillingError::NotFound("No such subscription: 'sub_x'".to_string()));

        let err: BillingError = ProviderError::network("connection reset").into();
        assert_eq!(err, BillingError::Provider("connection reset".to_string()));
    }

    #[test]
    fn display_includes_code() {
        let err = ProviderError::network("timeout").with_provider_code("api_connection_error");
        assert_eq!(err.to_string(), "network_error: timeout");
        assert_eq!(err.provider_code.as_deref(), Some("api_connection_error"));
    }

    #[test]
    fn projection_drops_unmodelled_fields() {
        let mut raw = expanded_subscription();
        raw["trial_end"] = json!(1700500000);
        raw["latest_invoice"] = json!("in_1");
        raw["plan"] = json!({"id": "price_123"});

        let sub: ProviderSubscription = serde_json::from_value(raw).unwrap();
        let wire = serde_json::to_value(&sub).unwrap();

        let mut keys: Vec<&str> = wire.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "cancel_at_period_end",
                "created",
                "current_period_end",
                "current_period_start",
                "customer",
                "id",
                "items",
                "metadata",
                "status",
            ]
        );
    }

    #[test]
    fn object_ids_are_plain_tokens() {
        assert!(is_object_id("sub_1NqXyZ2eZvKYlo2C"));
        assert!(is_object_id("cus_mem_0001"));
        assert!(!is_object_id(""));
        assert!(!is_object_id("sub_1?expand[]=customer"));
        assert!(!is_object_id("../customers/cus_1"));
        assert!(!is_object_id("sub_1/cancel"));
        assert!(!is_object_id("sub_1%2F"));
    }

    #[test]
    fn billing_provider_is_object_safe() {
        fn _accepts_dyn(_provider: &dyn BillingProvider) {}
    }
}
