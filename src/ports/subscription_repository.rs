//! Subscription mirror repository port.

use async_trait::async_trait;

use crate::domain::billing::{StatusChange, SubscriptionRecord, SubscriptionSnapshot, UpsertOutcome};
use crate::domain::foundation::{DomainError, UserId};

/// Persistence for mirrored subscriptions.
///
/// Implementations must keep at most one record per provider subscription
/// id.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert or update the record for `snapshot.provider_subscription_id`.
    ///
    /// An update only applies when `snapshot.version` is not older than the
    /// stored version; otherwise nothing is written and `Stale` is returned.
    async fn upsert(&self, snapshot: &SubscriptionSnapshot) -> Result<UpsertOutcome, DomainError>;

    /// Apply a direct status change.
    ///
    /// Returns `false` when no record exists for the id.
    async fn apply_status_change(
        &self,
        provider_subscription_id: &str,
        change: StatusChange,
    ) -> Result<bool, DomainError>;

    /// Find by provider subscription id.
    async fn find_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Most recently updated record for a user.
    ///
    /// Records that grant access are preferred over ended ones.
    async fn find_current_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;
}
