//! Axum router configuration for billing endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel_subscription, create_checkout_session, create_portal_session, get_entitlements,
    get_subscription, handle_webhook, health, BillingAppState,
};

/// Create the billing API router.
///
/// # Routes
///
/// ## Member endpoints
/// - `POST /create-checkout-session` - Start hosted checkout
/// - `GET /subscription/:userId` - Live subscription at the provider
/// - `POST /cancel-subscription` - Cancel at period end
/// - `POST /create-portal-session` - Open the billing portal
/// - `GET /entitlements/:userId` - Effective tier and access matrix
///
/// ## Webhook endpoint (no auth, signature verified)
/// - `POST /webhook` - Provider event delivery
///
/// ## Operations
/// - `GET /health` - Liveness probe
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        // Member endpoints
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/subscription/:user_id", get(get_subscription))
        .route("/cancel-subscription", post(cancel_subscription))
        .route("/create-portal-session", post(create_portal_session))
        .route("/entitlements/:user_id", get(get_entitlements))
        // Webhook
        .route("/webhook", post(handle_webhook))
        .route("/health", get(health))
}
