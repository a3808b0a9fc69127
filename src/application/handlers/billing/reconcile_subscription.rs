//! SubscriptionReconciler - brings the mirror in line with the provider.
//!
//! Always reads the authoritative subscription from the provider, derives
//! the tier from its product, and upserts by provider subscription id under
//! the version guard.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::billing::{
    derive_tier, BillingError, SubscriptionSnapshot, SubscriptionStatus, UpsertOutcome,
};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{BillingProvider, ProviderSubscription, SubscriptionRepository};

/// Reconciles one subscription at a time.
pub struct SubscriptionReconciler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    provider: Arc<dyn BillingProvider>,
}

impl SubscriptionReconciler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        provider: Arc<dyn BillingProvider>,
    ) -> Self {
        Self {
            subscriptions,
            provider,
        }
    }

    /// Fetch `subscription_id` from the provider and upsert it for `user_id`.
    ///
    /// `version` is the `created` time of the triggering event.
    pub async fn reconcile(
        &self,
        user_id: &UserId,
        subscription_id: &str,
        version: i64,
    ) -> Result<UpsertOutcome, BillingError> {
        let subscription = self.provider.get_subscription(subscription_id).await?;
        let snapshot = Self::snapshot_from_provider(user_id.clone(), &subscription, version);
        self.store(snapshot).await
    }

    /// Upsert a prepared snapshot and log the outcome.
    pub async fn store(&self, snapshot: SubscriptionSnapshot) -> Result<UpsertOutcome, BillingError> {
        let outcome = self.subscriptions.upsert(&snapshot).await?;

        match outcome {
            UpsertOutcome::Stale => tracing::info!(
                subscription_id = %snapshot.provider_subscription_id,
                version = snapshot.version,
                "Discarded stale subscription snapshot"
            ),
            _ => tracing::info!(
                user_id = %snapshot.user_id,
                subscription_id = %snapshot.provider_subscription_id,
                status = %snapshot.status,
                tier = %snapshot.tier,
                outcome = ?outcome,
                "Subscription mirrored"
            ),
        }
        Ok(outcome)
    }

    /// Normalize a provider subscription.
    pub fn snapshot_from_provider(
        user_id: UserId,
        subscription: &ProviderSubscription,
        version: i64,
    ) -> SubscriptionSnapshot {
        let empty = HashMap::new();
        let (name, metadata) = match subscription.primary_product() {
            Some(product) => (product.name.as_deref(), &product.metadata),
            None => (None, &empty),
        };

        SubscriptionSnapshot {
            user_id,
            provider_subscription_id: subscription.id.clone(),
            status: SubscriptionStatus::from_provider(
                &subscription.status,
                subscription.cancel_at_period_end,
            ),
            tier: derive_tier(name, metadata),
            current_period_start: subscription.period_start().and_then(Timestamp::from_unix_secs),
            current_period_end: subscription.period_end().and_then(Timestamp::from_unix_secs),
            cancel_at_period_end: subscription.cancel_at_period_end,
            version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryBillingProvider, InMemoryRecordStore};
    use crate::domain::billing::MembershipTier;
    use crate::ports::ProductRef;

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    fn setup() -> (InMemoryRecordStore, InMemoryBillingProvider, SubscriptionReconciler) {
        let store = InMemoryRecordStore::new();
        let provider = InMemoryBillingProvider::new();
        let reconciler =
            SubscriptionReconciler::new(Arc::new(store.clone()), Arc::new(provider.clone()));
        (store, provider, reconciler)
    }

    #[test]
    fn snapshot_derives_tier_from_product_name() {
        let sub = InMemoryBillingProvider::active_subscription(
            "sub_1",
            "cus_1",
            "Breakthrough Annual",
            None,
            1_700_000_000,
        );
        let snapshot = SubscriptionReconciler::snapshot_from_provider(user(), &sub, 1_700_000_100);

        assert_eq!(snapshot.tier, MembershipTier::Breakthrough);
        assert_eq!(snapshot.status, SubscriptionStatus::Active);
        assert_eq!(snapshot.version, 1_700_000_100);
        assert_eq!(
            snapshot.current_period_start.map(|t| t.unix_secs()),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn snapshot_prefers_metadata_tag() {
        let sub = InMemoryBillingProvider::active_subscription(
            "sub_1",
            "cus_1",
            "Breakthrough Annual",
            Some("driven"),
            1,
        );
        let snapshot = SubscriptionReconciler::snapshot_from_provider(user(), &sub, 1);
        assert_eq!(snapshot.tier, MembershipTier::Driven);
    }

    #[test]
    fn unexpanded_product_is_unknown_tier() {
        let mut sub =
            InMemoryBillingProvider::active_subscription("sub_1", "cus_1", "Driven", None, 1);
        sub.items.data[0].price.product = ProductRef::Id("prod_1".to_string());

        let snapshot = SubscriptionReconciler::snapshot_from_provider(user(), &sub, 1);
        assert_eq!(snapshot.tier, MembershipTier::Unknown);
    }

    #[test]
    fn cancel_flag_maps_to_canceling() {
        let mut sub =
            InMemoryBillingProvider::active_subscription("sub_1", "cus_1", "Driven", None, 1);
        sub.cancel_at_period_end = true;

        let snapshot = SubscriptionReconciler::snapshot_from_provider(user(), &sub, 1);
        assert_eq!(snapshot.status, SubscriptionStatus::Canceling);
        assert!(snapshot.cancel_at_period_end);
    }

    #[test]
    fn item_level_periods_are_used_when_top_level_absent() {
        let mut sub =
            InMemoryBillingProvider::active_subscription("sub_1", "cus_1", "Driven", None, 1);
        sub.current_period_start = None;
        sub.current_period_end = None;
        sub.items.data[0].current_period_start = Some(10);
        sub.items.data[0].current_period_end = Some(20);

        let snapshot = SubscriptionReconciler::snapshot_from_provider(user(), &sub, 1);
        assert_eq!(snapshot.current_period_end.map(|t| t.unix_secs()), Some(20));
    }

    #[tokio::test]
    async fn reconcile_fetches_and_upserts() {
        let (store, provider, reconciler) = setup();
        provider.put_subscription(InMemoryBillingProvider::active_subscription(
            "sub_1", "cus_1", "Aspiring", None, 100,
        ));

        let outcome = reconciler.reconcile(&user(), "sub_1", 100).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::Inserted);
        let record = store.subscription("sub_1").unwrap();
        assert_eq!(record.tier, MembershipTier::Aspiring);
        assert_eq!(record.provider_version, 100);
    }

    #[tokio::test]
    async fn older_event_does_not_overwrite_newer_state() {
        let (store, provider, reconciler) = setup();
        let mut sub =
            InMemoryBillingProvider::active_subscription("sub_1", "cus_1", "Driven", None, 100);
        sub.status = "past_due".to_string();
        provider.put_subscription(sub);
        reconciler.reconcile(&user(), "sub_1", 300).await.unwrap();

        provider.put_subscription(InMemoryBillingProvider::active_subscription(
            "sub_1", "cus_1", "Driven", None, 100,
        ));
        let outcome = reconciler.reconcile(&user(), "sub_1", 200).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::Stale);
        assert_eq!(
            store.subscription("sub_1").unwrap().status,
            SubscriptionStatus::PastDue
        );
    }

    #[tokio::test]
    async fn missing_subscription_is_not_found() {
        let (_store, _provider, reconciler) = setup();
        let err = reconciler.reconcile(&user(), "sub_x", 1).await.unwrap_err();
        assert!(matches!(err, BillingError::NotFound(_)));
    }
}
