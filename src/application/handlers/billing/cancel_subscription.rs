//! CancelSubscriptionHandler - Command handler for member-initiated
//! cancellation at the end of the current period.

use std::sync::Arc;

use crate::domain::billing::{BillingError, StatusChange};
use crate::domain::foundation::UserId;
use crate::ports::{is_object_id, BillingProvider, ProviderSubscription, SubscriptionRepository};

/// Command to cancel a subscription.
#[derive(Debug, Clone, Default)]
pub struct CancelSubscriptionCommand {
    pub subscription_id: String,
    pub user_id: String,
}

/// Handler for cancelling subscriptions.
pub struct CancelSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    provider: Arc<dyn BillingProvider>,
}

impl CancelSubscriptionHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        provider: Arc<dyn BillingProvider>,
    ) -> Self {
        Self {
            subscriptions,
            provider,
        }
    }

    /// Schedules cancellation with the provider and marks the mirror as
    /// `canceling`. The mirror write is best effort; the webhook that
    /// follows reconciles it either way.
    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<ProviderSubscription, BillingError> {
        let mut missing = Vec::new();
        if cmd.subscription_id.trim().is_empty() {
            missing.push("subscriptionId");
        }
        if cmd.user_id.trim().is_empty() {
            missing.push("userId");
        }
        if !missing.is_empty() {
            return Err(BillingError::missing(missing));
        }

        let user_id = UserId::new(cmd.user_id)?;
        let subscription_id = cmd.subscription_id.trim();
        if !is_object_id(subscription_id) {
            return Err(BillingError::validation(
                "subscriptionId",
                "expected letters, digits and underscores only",
            ));
        }

        if let Some(record) = self.subscriptions.find_by_provider_id(subscription_id).await? {
            if record.user_id != user_id {
                tracing::warn!(
                    user_id = %user_id,
                    subscription_id,
                    "Cancel requested for another member's subscription"
                );
                return Err(BillingError::forbidden(
                    "Subscription does not belong to this user",
                ));
            }
        }

        let subscription = self
            .provider
            .cancel_at_period_end(subscription_id)
            .await
            .map_err(|e| {
                tracing::error!(subscription_id, error = %e, "Failed to cancel subscription");
                BillingError::from(e)
            })?;

        if let Err(e) = self
            .subscriptions
            .apply_status_change(subscription_id, StatusChange::canceling())
            .await
        {
            tracing::warn!(subscription_id, error = %e, "Failed to mirror cancellation");
        }

        tracing::info!(user_id = %user_id, subscription_id, "Subscription set to cancel at period end");
        Ok(subscription)
    }
}
