//! In-memory record store.
//!
//! Implements the profile, customer and subscription repositories over a
//! single process-local state, with the same uniqueness and version rules
//! as the persistent adapters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::billing::{
    CustomerRecord, ProfileRecord, StatusChange, SubscriptionRecord, SubscriptionSnapshot,
    UpsertOutcome,
};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::{CustomerRepository, ProfileRepository, SubscriptionRepository};

/// Process-local record store.
#[derive(Default, Clone)]
pub struct InMemoryRecordStore {
    inner: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    profiles: HashMap<UserId, ProfileRecord>,
    customers: HashMap<UserId, CustomerRecord>,
    subscriptions: HashMap<String, SubscriptionRecord>,
    fail_writes: bool,
}

impl StoreState {
    fn check_writable(&self) -> Result<(), DomainError> {
        if self.fail_writes {
            return Err(DomainError::new(
                ErrorCode::StoreUnavailable,
                "record store is read-only",
            ));
        }
        Ok(())
    }
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every write fail with `StoreUnavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Seed a profile.
    pub fn insert_profile(&self, profile: ProfileRecord) {
        self.state().profiles.insert(profile.user_id.clone(), profile);
    }

    pub fn profile(&self, user_id: &UserId) -> Option<ProfileRecord> {
        self.state().profiles.get(user_id).cloned()
    }

    pub fn customer_count(&self) -> usize {
        self.state().customers.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.state().subscriptions.len()
    }

    pub fn subscription(&self, provider_subscription_id: &str) -> Option<SubscriptionRecord> {
        self.state().subscriptions.get(provider_subscription_id).cloned()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRecordStore {
    async fn find(&self, user_id: &UserId) -> Result<Option<ProfileRecord>, DomainError> {
        Ok(self.state().profiles.get(user_id).cloned())
    }

    async fn find_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<ProfileRecord>, DomainError> {
        Ok(self
            .state()
            .profiles
            .values()
            .find(|p| p.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn link_customer(&self, user_id: &UserId, customer_id: &str) -> Result<(), DomainError> {
        let mut state = self.state();
        state.check_writable()?;
        state
            .profiles
            .entry(user_id.clone())
            .and_modify(|p| p.stripe_customer_id = Some(customer_id.to_string()))
            .or_insert_with(|| ProfileRecord {
                user_id: user_id.clone(),
                stripe_customer_id: Some(customer_id.to_string()),
            });
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for InMemoryRecordStore {
    async fn insert_if_absent(&self, record: &CustomerRecord) -> Result<CustomerRecord, DomainError> {
        let mut state = self.state();
        state.check_writable()?;

        if let Some(existing) = state.customers.get(&record.user_id) {
            return Ok(existing.clone());
        }
        if state
            .customers
            .values()
            .any(|c| c.stripe_customer_id == record.stripe_customer_id)
        {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                format!(
                    "customer {} is already linked to another user",
                    record.stripe_customer_id
                ),
            ));
        }

        state.customers.insert(record.user_id.clone(), record.clone());
        Ok(record.clone())
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<CustomerRecord>, DomainError> {
        Ok(self.state().customers.get(user_id).cloned())
    }

    async fn find_user_by_customer_id(&self, customer_id: &str) -> Result<Option<UserId>, DomainError> {
        Ok(self
            .state()
            .customers
            .values()
            .find(|c| c.stripe_customer_id == customer_id)
            .map(|c| c.user_id.clone()))
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryRecordStore {
    async fn upsert(&self, snapshot: &SubscriptionSnapshot) -> Result<UpsertOutcome, DomainError> {
        let mut state = self.state();
        state.check_writable()?;
        let now = Timestamp::now();

        match state.subscriptions.get_mut(&snapshot.provider_subscription_id) {
            Some(existing) => Ok(existing.apply_snapshot(snapshot, now)),
            None => {
                state.subscriptions.insert(
                    snapshot.provider_subscription_id.clone(),
                    SubscriptionRecord::from_snapshot(snapshot, now),
                );
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn apply_status_change(
        &self,
        provider_subscription_id: &str,
        change: StatusChange,
    ) -> Result<bool, DomainError> {
        let mut state = self.state();
        state.check_writable()?;

        match state.subscriptions.get_mut(provider_subscription_id) {
            Some(record) => {
                record.apply_status_change(change, Timestamp::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        Ok(self.state().subscriptions.get(provider_subscription_id).cloned())
    }

    async fn find_current_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        Ok(self
            .state()
            .subscriptions
            .values()
            .filter(|r| &r.user_id == user_id)
            .max_by_key(|r| (r.status.has_access(), r.updated_at))
            .cloned())
    }
}
