//! GetSubscriptionHandler - Query handler for a member's live subscription
//! as the provider currently reports it.

use std::sync::Arc;

use crate::domain::billing::{BillingError, SubscriptionStatus};
use crate::domain::foundation::UserId;
use crate::ports::{BillingProvider, CustomerRepository, ProfileRepository, ProviderSubscription};

/// Query for a member's current subscription.
#[derive(Debug, Clone)]
pub struct GetSubscriptionQuery {
    pub user_id: String,
}

pub struct GetSubscriptionHandler {
    profiles: Arc<dyn ProfileRepository>,
    customers: Arc<dyn CustomerRepository>,
    provider: Arc<dyn BillingProvider>,
}

impl GetSubscriptionHandler {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        customers: Arc<dyn CustomerRepository>,
        provider: Arc<dyn BillingProvider>,
    ) -> Self {
        Self {
            profiles,
            customers,
            provider,
        }
    }

    /// Newest subscription that has not ended, or `None` when the member has
    /// no customer or only ended subscriptions.
    pub async fn handle(
        &self,
        query: GetSubscriptionQuery,
    ) -> Result<Option<ProviderSubscription>, BillingError> {
        if query.user_id.trim().is_empty() {
            return Err(BillingError::missing(vec!["userId"]));
        }
        let user_id = UserId::new(query.user_id)?;

        let Some(customer_id) = self.customer_id(&user_id).await? else {
            return Ok(None);
        };

        let subscriptions = self
            .provider
            .list_subscriptions(&customer_id)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Failed to list subscriptions");
                BillingError::from(e)
            })?;

        Ok(subscriptions.into_iter().find(|s| {
            !SubscriptionStatus::from_provider(&s.status, s.cancel_at_period_end).is_terminal()
        }))
    }

    async fn customer_id(&self, user_id: &UserId) -> Result<Option<String>, BillingError> {
        let linked = self
            .profiles
            .find(user_id)
            .await?
            .and_then(|p| p.stripe_customer_id);
        if linked.is_some() {
            return Ok(linked);
        }
        Ok(self
            .customers
            .find_by_user(user_id)
            .await?
            .map(|c| c.stripe_customer_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryBillingProvider, InMemoryRecordStore};

    fn setup() -> (InMemoryRecordStore, InMemoryBillingProvider, GetSubscriptionHandler) {
        let store = InMemoryRecordStore::new();
        let provider = InMemoryBillingProvider::new();
        let handler = GetSubscriptionHandler::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(provider.clone()),
        );
        (store, provider, handler)
    }

    fn query(user: &str) -> GetSubscriptionQuery {
        GetSubscriptionQuery {
            user_id: user.to_string(),
        }
    }

    #[tokio::test]
    async fn no_customer_means_no_subscription() {
        let (_store, _provider, handler) = setup();
        assert!(handler.handle(query("u1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn returns_newest_live_subscription() {
        let (store, provider, handler) = setup();
        store
            .link_customer(&UserId::new("u1").unwrap(), "cus_1")
            .await
            .unwrap();
        provider.put_subscription(InMemoryBillingProvider::active_subscription(
            "sub_old", "cus_1", "Driven", None, 100,
        ));
        let mut ended =
            InMemoryBillingProvider::active_subscription("sub_ended", "cus_1", "Aspiring", None, 300);
        ended.status = "canceled".to_string();
        provider.put_subscription(ended);
        provider.put_subscription(InMemoryBillingProvider::active_subscription(
            "sub_new", "cus_1", "Aspiring", None, 200,
        ));

        let current = handler.handle(query("u1")).await.unwrap().unwrap();
        assert_eq!(current.id, "sub_new");
    }

    #[tokio::test]
    async fn only_ended_subscriptions_yield_none() {
        let (store, provider, handler) = setup();
        store
            .link_customer(&UserId::new("u1").unwrap(), "cus_1")
            .await
            .unwrap();
        let mut expired =
            InMemoryBillingProvider::active_subscription("sub_1", "cus_1", "Driven", None, 100);
        expired.status = "incomplete_expired".to_string();
        provider.put_subscription(expired);

        assert!(handler.handle(query("u1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_user_is_rejected() {
        let (_store, _provider, handler) = setup();
        let err = handler.handle(query(" ")).await.unwrap_err();
        assert_eq!(err, BillingError::missing(vec!["userId"]));
    }
}
