//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Json, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::handlers::billing::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CheckEntitlementHandler,
    CheckEntitlementQuery, CreateCheckoutSessionCommand, CreateCheckoutSessionHandler,
    CreatePortalSessionCommand, CreatePortalSessionHandler, GetSubscriptionHandler,
    GetSubscriptionQuery, HandleBillingWebhookCommand, HandleBillingWebhookHandler, KeyedLocks,
    SubscriptionReconciler,
};
use crate::domain::billing::{BillingError, WebhookVerifier};
use crate::ports::{BillingProvider, CustomerRepository, ProfileRepository, SubscriptionRepository};

use super::dto::{
    CancelSubscriptionRequest, CreateCheckoutSessionRequest, CreatePortalSessionRequest,
    EntitlementsParams, EntitlementsResponse, ErrorResponse, HealthResponse,
    SubscriptionResponse, UrlResponse, WebhookAck,
};

/// Header carrying the provider's webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned for each request; every client is constructed once at startup
/// and shared through an `Arc`.
#[derive(Clone)]
pub struct BillingAppState {
    pub profiles: Arc<dyn ProfileRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub provider: Arc<dyn BillingProvider>,
    pub verifier: Arc<WebhookVerifier>,
    /// Serializes customer provisioning per member.
    pub customer_locks: Arc<KeyedLocks>,
    /// Default return page for checkout and the billing portal.
    pub dashboard_url: String,
    pub allow_tier_preview: bool,
}

impl BillingAppState {
    /// Create handlers on demand from the shared state.
    pub fn create_checkout_session_handler(&self) -> CreateCheckoutSessionHandler {
        CreateCheckoutSessionHandler::new(
            self.profiles.clone(),
            self.customers.clone(),
            self.provider.clone(),
            self.customer_locks.clone(),
            self.dashboard_url.clone(),
        )
    }

    pub fn get_subscription_handler(&self) -> GetSubscriptionHandler {
        GetSubscriptionHandler::new(
            self.profiles.clone(),
            self.customers.clone(),
            self.provider.clone(),
        )
    }

    pub fn cancel_subscription_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(self.subscriptions.clone(), self.provider.clone())
    }

    pub fn create_portal_session_handler(&self) -> CreatePortalSessionHandler {
        CreatePortalSessionHandler::new(self.provider.clone(), self.dashboard_url.clone())
    }

    pub fn webhook_handler(&self) -> HandleBillingWebhookHandler {
        let reconciler = SubscriptionReconciler::new(self.subscriptions.clone(), self.provider.clone());
        HandleBillingWebhookHandler::new(
            self.verifier.clone(),
            self.customers.clone(),
            self.profiles.clone(),
            self.subscriptions.clone(),
            Arc::new(reconciler),
        )
    }

    pub fn check_entitlement_handler(&self) -> CheckEntitlementHandler {
        CheckEntitlementHandler::new(self.subscriptions.clone(), self.allow_tier_preview)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /subscription/:userId - Member's live subscription at the provider
pub async fn get_subscription(
    State(state): State<BillingAppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.get_subscription_handler();
    let subscription = handler.handle(GetSubscriptionQuery { user_id }).await?;

    Ok(Json(SubscriptionResponse { subscription }))
}

/// GET /entitlements/:userId - Effective tier and access decisions
pub async fn get_entitlements(
    State(state): State<BillingAppState>,
    Path(user_id): Path<String>,
    params: Result<Query<EntitlementsParams>, QueryRejection>,
) -> Result<impl IntoResponse, BillingApiError> {
    let Query(params) =
        params.map_err(|e| BillingError::validation("query", e.body_text()))?;

    let handler = state.check_entitlement_handler();
    let query = CheckEntitlementQuery {
        user_id,
        required: params.required,
        preview_tier: params.preview_tier,
    };

    let result = handler.handle(query).await?;

    Ok(Json(EntitlementsResponse::from(result)))
}

/// GET /health - Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /create-checkout-session - Start a hosted subscription checkout
pub async fn create_checkout_session(
    State(state): State<BillingAppState>,
    body: Result<Json<CreateCheckoutSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BillingApiError> {
    let Json(request) = body.map_err(body_error)?;

    let handler = state.create_checkout_session_handler();
    let cmd = CreateCheckoutSessionCommand {
        price_id: request.price_id,
        user_id: request.user_id,
        customer_email: request.customer_email,
        return_url: request.return_url,
    };

    let result = handler.handle(cmd).await?;

    Ok(Json(UrlResponse { url: result.url }))
}

/// POST /cancel-subscription - Cancel at the end of the current period
pub async fn cancel_subscription(
    State(state): State<BillingAppState>,
    body: Result<Json<CancelSubscriptionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BillingApiError> {
    let Json(request) = body.map_err(body_error)?;

    let handler = state.cancel_subscription_handler();
    let cmd = CancelSubscriptionCommand {
        subscription_id: request.subscription_id,
        user_id: request.user_id,
    };

    let subscription = handler.handle(cmd).await?;

    Ok(Json(SubscriptionResponse {
        subscription: Some(subscription),
    }))
}

/// POST /create-portal-session - Open the self-service billing portal
pub async fn create_portal_session(
    State(state): State<BillingAppState>,
    body: Result<Json<CreatePortalSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BillingApiError> {
    let Json(request) = body.map_err(body_error)?;

    let handler = state.create_portal_session_handler();
    let cmd = CreatePortalSessionCommand {
        customer_id: request.customer_id,
        return_url: request.return_url,
    };

    let session = handler.handle(cmd).await?;

    Ok(Json(UrlResponse { url: session.url }))
}

/// POST /webhook - Provider event delivery
///
/// The body must reach the verifier byte for byte, so it is taken as raw
/// `Bytes`. Verification failures answer 400 with a plain-text
/// `Webhook Error: ...` body; every verified delivery is acknowledged.
pub async fn handle_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let handler = state.webhook_handler();
    let cmd = HandleBillingWebhookCommand {
        payload: body.to_vec(),
        signature,
    };

    match handler.handle(cmd).await {
        Ok(_) => Json(WebhookAck::received()).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, format!("Webhook Error: {}", e)).into_response(),
    }
}

fn body_error(rejection: JsonRejection) -> BillingError {
    BillingError::validation("body", rejection.body_text())
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl BillingApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BillingError::MissingParameters(_) | BillingError::ValidationFailed { .. } => {
                StatusCode::BAD_REQUEST
            }
            BillingError::Forbidden(_) => StatusCode::FORBIDDEN,
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::Provider(_) | BillingError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0.message(), "Request failed");
        }
        let body = ErrorResponse::new(self.0.code(), self.0.message());
        (status, Json(body)).into_response()
    }
}
