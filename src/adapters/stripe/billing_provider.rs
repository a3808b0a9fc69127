//! Stripe billing provider adapter.
//!
//! Implements the `BillingProvider` port over the Stripe REST API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(secret_key).with_base_url("http://localhost:12111");
//! let provider = StripeBillingProvider::new(config);
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::config::PaymentConfig;
use crate::ports::{
    is_object_id, BillingProvider, CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer,
    PortalSession, ProviderError, ProviderErrorCode, ProviderSubscription,
};

use super::api_types::{StripeErrorResponse, StripeList, StripeSession};

/// Stripe rejects expansions nested deeper than this.
const MAX_EXPAND_DEPTH: usize = 4;

/// Expansion applied to single-subscription reads.
const SUBSCRIPTION_EXPAND: &str = "items.data.price.product";

/// Expansion applied to subscription list reads.
///
/// The list envelope costs one level, so the product stays a bare id here.
const SUBSCRIPTION_LIST_EXPAND: &str = "data.items.data.price";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Set a custom API base URL (stripe-mock, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }
}

impl From<&PaymentConfig> for StripeConfig {
    fn from(config: &PaymentConfig) -> Self {
        Self::new(config.stripe_secret_key.clone()).with_base_url(config.api_base_url.clone())
    }
}

/// Stripe billing provider.
pub struct StripeBillingProvider {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeBillingProvider {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
    }

    /// Send a request and decode the success body, mapping Stripe's error
    /// envelope onto `ProviderError`.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = error_from_response(status.as_u16(), &body);
            tracing::error!(
                operation,
                status = status.as_u16(),
                provider_code = ?error.provider_code,
                error = %error.message,
                "Stripe request failed"
            );
            return Err(error);
        }

        response.json().await.map_err(|e| {
            ProviderError::invalid_response(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

/// Build a `ProviderError` from a non-success Stripe response.
///
/// The message is Stripe's own `error.message` when the body carries one.
fn error_from_response(status: u16, body: &str) -> ProviderError {
    let code = ProviderErrorCode::from_status(status);
    match serde_json::from_str::<StripeErrorResponse>(body) {
        Ok(parsed) => {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| format!("Stripe API error (HTTP {})", status));
            let error = ProviderError::new(code, message);
            match parsed.error.code {
                Some(provider_code) => error.with_provider_code(provider_code),
                None => error,
            }
        }
        Err(_) => ProviderError::new(code, format!("Stripe API error (HTTP {}): {}", status, body)),
    }
}

/// `expand[]` query pair for `path`, refused when Stripe would reject it.
fn expand_param(path: &'static str) -> Result<(&'static str, &'static str), ProviderError> {
    let depth = path.split('.').count();
    if depth > MAX_EXPAND_DEPTH {
        return Err(ProviderError::new(
            ProviderErrorCode::InvalidRequest,
            format!(
                "Expansion '{}' is {} levels deep; at most {} are allowed",
                path, depth, MAX_EXPAND_DEPTH
            ),
        ));
    }
    Ok(("expand[]", path))
}

fn subscription_path(subscription_id: &str) -> Result<String, ProviderError> {
    if !is_object_id(subscription_id) {
        return Err(ProviderError::new(
            ProviderErrorCode::InvalidRequest,
            format!("Invalid subscription id: '{}'", subscription_id),
        ));
    }
    Ok(format!("/v1/subscriptions/{}", subscription_id))
}

fn customer_params(request: &CreateCustomerRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![("metadata[user_id]", request.user_id.to_string())];
    if let Some(email) = &request.email {
        params.push(("email", email.clone()));
    }
    params
}

fn checkout_params(request: &CreateCheckoutRequest) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "subscription".to_string()),
        ("customer", request.customer_id.clone()),
        ("line_items[0][price]", request.price_id.clone()),
        ("line_items[0][quantity]", "1".to_string()),
        ("client_reference_id", request.user_id.to_string()),
        ("metadata[user_id]", request.user_id.to_string()),
        ("subscription_data[metadata][user_id]", request.user_id.to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
    ]
}

fn session_url(session: StripeSession) -> Result<(String, String), ProviderError> {
    match session.url {
        Some(url) => Ok((session.id, url)),
        None => Err(ProviderError::invalid_response(format!(
            "Stripe session {} has no url",
            session.id
        ))),
    }
}

#[async_trait]
impl BillingProvider for StripeBillingProvider {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, ProviderError> {
        let params = customer_params(&request);
        let customer: Customer = self
            .execute(
                "create_customer",
                self.post("/v1/customers")
                    .header("Idempotency-Key", request.idempotency_key.as_str())
                    .form(&params),
            )
            .await?;

        tracing::info!(
            user_id = %request.user_id,
            customer_id = %customer.id,
            "Stripe customer created"
        );
        Ok(customer)
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, ProviderError> {
        let params = checkout_params(&request);
        let session: StripeSession = self
            .execute(
                "create_checkout_session",
                self.post("/v1/checkout/sessions").form(&params),
            )
            .await?;

        let (id, url) = session_url(session)?;
        Ok(CheckoutSession { id, url })
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProviderSubscription, ProviderError> {
        let path = subscription_path(subscription_id)?;
        let expand = expand_param(SUBSCRIPTION_EXPAND)?;
        self.execute("get_subscription", self.get(&path).query(&[expand]))
            .await
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ProviderSubscription>, ProviderError> {
        let expand = expand_param(SUBSCRIPTION_LIST_EXPAND)?;
        let list: StripeList<ProviderSubscription> = self
            .execute(
                "list_subscriptions",
                self.get("/v1/subscriptions").query(&[
                    ("customer", customer_id),
                    ("status", "all"),
                    expand,
                ]),
            )
            .await?;

        if list.has_more {
            tracing::debug!(customer_id, "Subscription list truncated to first page");
        }

        let mut subscriptions = list.data;
        subscriptions.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(subscriptions)
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, ProviderError> {
        let session: StripeSession = self
            .execute(
                "create_portal_session",
                self.post("/v1/billing_portal/sessions")
                    .form(&[("customer", customer_id), ("return_url", return_url)]),
            )
            .await?;

        let (id, url) = session_url(session)?;
        Ok(PortalSession { id, url })
    }

    async fn cancel_at_period_end(
        &self,
        subscription_id: &str,
    ) -> Result<ProviderSubscription, ProviderError> {
        let path = subscription_path(subscription_id)?;
        let expand = expand_param(SUBSCRIPTION_EXPAND)?;
        self.execute(
            "cancel_at_period_end",
            self.post(&path).form(&[("cancel_at_period_end", "true"), expand]),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn config_trims_trailing_slash() {
        let config = StripeConfig::new("sk_test_x").with_base_url("http://localhost:12111/");
        assert_eq!(config.api_base_url(), "http://localhost:12111");
    }

    #[test]
    fn config_from_payment_section() {
        let payment = PaymentConfig {
            stripe_secret_key: "sk_test_abc".to_string(),
            api_base_url: "http://stripe-mock:12111".to_string(),
            ..Default::default()
        };
        let config = StripeConfig::from(&payment);
        assert_eq!(config.api_base_url(), "http://stripe-mock:12111");
        assert_eq!(config.api_key.expose_secret(), "sk_test_abc");
    }

    #[test]
    fn customer_params_carry_user_reference() {
        let request = CreateCustomerRequest {
            user_id: UserId::new("u1").unwrap(),
            email: Some("a@b.com".to_string()),
            idempotency_key: "fairway-customer-u1".to_string(),
        };
        let params = customer_params(&request);

        assert_eq!(param(&params, "metadata[user_id]"), Some("u1"));
        assert_eq!(param(&params, "email"), Some("a@b.com"));
    }

    #[test]
    fn customer_params_omit_missing_email() {
        let request = CreateCustomerRequest {
            user_id: UserId::new("u1").unwrap(),
            email: None,
            idempotency_key: "fairway-customer-u1".to_string(),
        };
        assert_eq!(param(&customer_params(&request), "email"), None);
    }

    #[test]
    fn checkout_params_describe_subscription_session() {
        let request = CreateCheckoutRequest {
            customer_id: "cus_1".to_string(),
            price_id: "price_123".to_string(),
            user_id: UserId::new("u1").unwrap(),
            success_url: "http://app/dashboard?checkout=success".to_string(),
            cancel_url: "http://app/dashboard?checkout=canceled".to_string(),
        };
        let params = checkout_params(&request);

        assert_eq!(param(&params, "mode"), Some("subscription"));
        assert_eq!(param(&params, "customer"), Some("cus_1"));
        assert_eq!(param(&params, "line_items[0][price]"), Some("price_123"));
        assert_eq!(param(&params, "line_items[0][quantity]"), Some("1"));
        assert_eq!(param(&params, "client_reference_id"), Some("u1"));
        assert_eq!(param(&params, "metadata[user_id]"), Some("u1"));
        assert_eq!(param(&params, "subscription_data[metadata][user_id]"), Some("u1"));
    }

    #[test]
    fn error_uses_stripe_message_and_code() {
        let body = r#"{"error":{"message":"No such price: 'price_x'","code":"resource_missing"}}"#;
        let error = error_from_response(400, body);

        assert_eq!(error.code, ProviderErrorCode::InvalidRequest);
        assert_eq!(error.message, "No such price: 'price_x'");
        assert_eq!(error.provider_code.as_deref(), Some("resource_missing"));
        assert!(!error.retryable);
    }

    #[test]
    fn error_maps_not_found() {
        let body = r#"{"error":{"message":"No such subscription: 'sub_x'"}}"#;
        let error = error_from_response(404, body);
        assert_eq!(error.code, ProviderErrorCode::NotFound);
        assert!(error.provider_code.is_none());
    }

    #[test]
    fn error_with_unparsable_body_keeps_raw_text() {
        let error = error_from_response(502, "Bad Gateway");
        assert_eq!(error.code, ProviderErrorCode::ProviderError);
        assert!(error.message.contains("Bad Gateway"));
        assert!(error.message.contains("502"));
    }

    #[test]
    fn rate_limit_is_retryable() {
        let error = error_from_response(429, r#"{"error":{"message":"Too many requests"}}"#);
        assert!(error.retryable);
    }

    #[test]
    fn subscription_expansions_fit_stripe_depth_limit() {
        assert_eq!(
            expand_param(SUBSCRIPTION_EXPAND).unwrap(),
            ("expand[]", "items.data.price.product")
        );
        assert_eq!(
            expand_param(SUBSCRIPTION_LIST_EXPAND).unwrap(),
            ("expand[]", "data.items.data.price")
        );
    }

    #[test]
    fn five_level_expansion_is_refused() {
        let err = expand_param("data.items.data.price.product").unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::InvalidRequest);
        assert!(err.message.contains("5 levels"));
    }

    #[test]
    fn subscription_path_accepts_plain_ids() {
        assert_eq!(
            subscription_path("sub_1NqXyZ").unwrap(),
            "/v1/subscriptions/sub_1NqXyZ"
        );
    }

    #[test]
    fn subscription_path_refuses_path_tricks() {
        for id in ["", "sub_1/cancel", "../customers/cus_1", "sub_1?expand[]=customer", "sub 1"] {
            let err = subscription_path(id).unwrap_err();
            assert_eq!(err.code, ProviderErrorCode::InvalidRequest, "id {:?}", id);
        }
    }

    #[tokio::test]
    async fn invalid_id_fails_before_any_request() {
        // Nothing listens on port 9; reaching the network would be a network error.
        let provider = StripeBillingProvider::new(
            StripeConfig::new("sk_test_x").with_base_url("http://127.0.0.1:9"),
        );

        let err = provider.cancel_at_period_end("sub_1/../../v1/customers").await.unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::InvalidRequest);

        let err = provider.get_subscription("sub_1?x=1").await.unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::InvalidRequest);
    }

    #[test]
    fn session_without_url_is_invalid() {
        let err = session_url(StripeSession {
            id: "cs_1".to_string(),
            url: None,
        })
        .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::InvalidResponse);
    }
}
