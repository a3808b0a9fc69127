//! HTTP DTOs for billing endpoints.
//!
//! Field names are camelCase on the wire; the web client posts and reads
//! these shapes directly.

use serde::{Deserialize, Serialize};

use crate::application::handlers::billing::CheckEntitlementResult;
use crate::domain::billing::{MembershipTier, SubscriptionStatus};
use crate::ports::ProviderSubscription;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /create-checkout-session`.
///
/// Every field defaults so that absent values surface as a 400 naming the
/// missing parameters rather than a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateCheckoutSessionRequest {
    pub price_id: String,
    pub user_id: String,
    pub customer_email: Option<String>,
    pub return_url: Option<String>,
}

/// Body of `POST /cancel-subscription`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CancelSubscriptionRequest {
    pub subscription_id: String,
    pub user_id: String,
}

/// Body of `POST /create-portal-session`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreatePortalSessionRequest {
    pub customer_id: String,
    pub return_url: Option<String>,
}

/// Query string of `GET /entitlements/:userId`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementsParams {
    #[serde(default)]
    pub required: Option<String>,
    #[serde(default)]
    pub preview_tier: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Redirect target for hosted checkout and the billing portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlResponse {
    pub url: String,
}

/// The member's subscription as projected by `ProviderSubscription`, or
/// `null` when the member has none. Provider fields outside the projection
/// are not returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub subscription: Option<ProviderSubscription>,
}

/// Acknowledgement returned for every verified webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Access decision per orderable tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessMatrix {
    pub free: bool,
    pub driven: bool,
    pub aspiring: bool,
    pub breakthrough: bool,
}

/// Effective entitlements of a member.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementsResponse {
    pub user_id: String,
    pub tier: MembershipTier,
    pub status: Option<SubscriptionStatus>,
    pub has_subscription: bool,
    pub overridden: bool,
    pub access: AccessMatrix,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_access: Option<bool>,
}

impl From<CheckEntitlementResult> for EntitlementsResponse {
    fn from(result: CheckEntitlementResult) -> Self {
        let mut access = AccessMatrix {
            free: false,
            driven: false,
            aspiring: false,
            breakthrough: false,
        };
        for (tier, allowed) in result.entitlements.access_matrix() {
            match tier {
                MembershipTier::Free => access.free = allowed,
                MembershipTier::Driven => access.driven = allowed,
                MembershipTier::Aspiring => access.aspiring = allowed,
                MembershipTier::Breakthrough => access.breakthrough = allowed,
                MembershipTier::Unknown => {}
            }
        }

        Self {
            user_id: result.user_id.to_string(),
            tier: result.entitlements.tier,
            status: result.entitlements.status,
            has_subscription: result.has_subscription,
            overridden: result.entitlements.overridden,
            access,
            has_access: result.has_access,
        }
    }
}

/// Error body: `{"error": "...", "code": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}
