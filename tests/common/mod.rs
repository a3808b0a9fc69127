//! Shared harness for HTTP integration tests: the real router over
//! in-memory adapters.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use fairway_billing::adapters::http::{app_router, BillingAppState};
use fairway_billing::adapters::memory::{InMemoryBillingProvider, InMemoryRecordStore};
use fairway_billing::application::handlers::billing::KeyedLocks;
use fairway_billing::config::ServerConfig;
use fairway_billing::domain::billing::{generate_signature_header, WebhookVerifier};

pub const WEBHOOK_SECRET: &str = "whsec_integration_secret";

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryRecordStore,
    pub provider: InMemoryBillingProvider,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_preview(false)
    }

    pub fn with_preview(allow_tier_preview: bool) -> Self {
        let store = InMemoryRecordStore::new();
        let provider = InMemoryBillingProvider::new();
        let server = ServerConfig::default();

        let state = BillingAppState {
            profiles: Arc::new(store.clone()),
            customers: Arc::new(store.clone()),
            subscriptions: Arc::new(store.clone()),
            provider: Arc::new(provider.clone()),
            verifier: Arc::new(WebhookVerifier::new(WEBHOOK_SECRET)),
            customer_locks: Arc::new(KeyedLocks::new()),
            dashboard_url: server.dashboard_url(),
            allow_tier_preview,
        };

        Self {
            router: app_router(state, &server),
            store,
            provider,
        }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send_json(request).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send_json(request).await
    }

    /// Deliver a webhook signed with the test secret.
    pub async fn deliver(&self, event: &Value) -> (StatusCode, String) {
        let payload = event.to_string();
        let signature =
            generate_signature_header(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), payload.as_bytes());
        self.post_webhook(payload, Some(signature)).await
    }

    pub async fn post_webhook(&self, payload: String, signature: Option<String>) -> (StatusCode, String) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/webhook")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            builder = builder.header("stripe-signature", signature);
        }
        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::from(payload)).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

/// Event envelope as the provider sends it.
pub fn event(id: &str, event_type: &str, created: i64, object: Value) -> Value {
    serde_json::json!({
        "id": id,
        "object": "event",
        "type": event_type,
        "created": created,
        "livemode": false,
        "api_version": "2023-10-16",
        "data": { "object": object }
    })
}

/// Check out `user_id`, then complete the purchase of a `tier` subscription
/// through a signed `checkout.session.completed` delivery.
///
/// Returns the provider customer id and subscription id.
pub async fn subscribe(app: &TestApp, user_id: &str, tier: &str) -> (String, String) {
    let (status, _) = app
        .post_json(
            "/create-checkout-session",
            serde_json::json!({ "priceId": "price_123", "userId": user_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let customer_id = app
        .provider
        .checkouts()
        .last()
        .map(|c| c.customer_id.clone())
        .unwrap();
    let subscription_id = format!("sub_{}", user_id);
    let created = chrono::Utc::now().timestamp();
    app.provider.put_subscription(InMemoryBillingProvider::active_subscription(
        &subscription_id,
        &customer_id,
        "Fairway Membership",
        Some(tier),
        created,
    ));

    let (status, _) = app
        .deliver(&event(
            &format!("evt_checkout_{}", user_id),
            "checkout.session.completed",
            created,
            serde_json::json!({
                "id": format!("cs_{}", user_id),
                "object": "checkout.session",
                "customer": customer_id,
                "subscription": subscription_id,
                "client_reference_id": user_id,
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    (customer_id, subscription_id)
}
