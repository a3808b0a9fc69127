//! CheckEntitlementHandler - Query handler for a member's effective tier
//! and access decisions.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Entitlements, MembershipTier};
use crate::domain::foundation::UserId;
use crate::ports::SubscriptionRepository;

/// Query for a member's entitlements.
#[derive(Debug, Clone, Default)]
pub struct CheckEntitlementQuery {
    pub user_id: String,
    /// Tier to check access against.
    pub required: Option<String>,
    /// Session-scoped tier override.
    pub preview_tier: Option<String>,
}

/// Entitlements plus the optional access decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckEntitlementResult {
    pub user_id: UserId,
    pub entitlements: Entitlements,
    /// True when a mirrored subscription currently grants its tier.
    pub has_subscription: bool,
    /// Present when the query named a required tier.
    pub has_access: Option<bool>,
}

pub struct CheckEntitlementHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    allow_tier_preview: bool,
}

impl CheckEntitlementHandler {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>, allow_tier_preview: bool) -> Self {
        Self {
            subscriptions,
            allow_tier_preview,
        }
    }

    pub async fn handle(
        &self,
        query: CheckEntitlementQuery,
    ) -> Result<CheckEntitlementResult, BillingError> {
        if query.user_id.trim().is_empty() {
            return Err(BillingError::missing(vec!["userId"]));
        }
        let user_id = UserId::new(query.user_id)?;

        let required = parse_tier("required", query.required)?;
        let preview = parse_tier("previewTier", query.preview_tier)?;
        if preview.is_some() && !self.allow_tier_preview {
            return Err(BillingError::forbidden("Tier preview is disabled"));
        }

        let record = self.subscriptions.find_current_for_user(&user_id).await?;
        let entitlements = Entitlements::resolve(record.as_ref(), preview);

        tracing::debug!(
            user_id = %user_id,
            tier = %entitlements.tier,
            overridden = entitlements.overridden,
            "Entitlements resolved"
        );

        Ok(CheckEntitlementResult {
            has_subscription: record.map_or(false, |r| r.status.has_access()),
            has_access: required.map(|tier| entitlements.allows(tier)),
            entitlements,
            user_id,
        })
    }
}

fn parse_tier(field: &str, raw: Option<String>) -> Result<Option<MembershipTier>, BillingError> {
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => match value.parse::<MembershipTier>() {
            Ok(MembershipTier::Unknown) | Err(_) => Err(BillingError::validation(
                field,
                format!("'{}' is not a membership tier", value),
            )),
            Ok(tier) => Ok(Some(tier)),
        },
    }
}
