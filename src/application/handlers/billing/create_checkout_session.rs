//! CreateCheckoutSessionHandler - Command handler for starting a hosted
//! subscription checkout.
//!
//! Provisions the member's provider customer on first use, then asks the
//! provider for a checkout session. No subscription is written here; the
//! mirror is filled in by the webhook once the member pays.

use std::sync::Arc;

use crate::domain::billing::{customer_idempotency_key, BillingError, CustomerRecord};
use crate::domain::foundation::{ErrorCode, UserId};
use crate::ports::{
    BillingProvider, CreateCheckoutRequest, CreateCustomerRequest, CustomerRepository,
    ProfileRepository,
};

use super::customer_lock::KeyedLocks;

/// Command to create a checkout session.
#[derive(Debug, Clone, Default)]
pub struct CreateCheckoutSessionCommand {
    pub price_id: String,
    pub user_id: String,
    pub customer_email: Option<String>,
    /// Page the provider sends the member back to. Defaults to the dashboard.
    pub return_url: Option<String>,
}

/// Result of creating a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCheckoutSessionResult {
    pub session_id: String,
    pub url: String,
    pub customer_id: String,
}

/// Handler for creating checkout sessions.
pub struct CreateCheckoutSessionHandler {
    profiles: Arc<dyn ProfileRepository>,
    customers: Arc<dyn CustomerRepository>,
    provider: Arc<dyn BillingProvider>,
    locks: Arc<KeyedLocks>,
    default_return_url: String,
}

impl CreateCheckoutSessionHandler {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        customers: Arc<dyn CustomerRepository>,
        provider: Arc<dyn BillingProvider>,
        locks: Arc<KeyedLocks>,
        default_return_url: impl Into<String>,
    ) -> Self {
        Self {
            profiles,
            customers,
            provider,
            locks,
            default_return_url: default_return_url.into(),
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateCheckoutSessionCommand,
    ) -> Result<CreateCheckoutSessionResult, BillingError> {
        let mut missing = Vec::new();
        if cmd.price_id.trim().is_empty() {
            missing.push("priceId");
        }
        if cmd.user_id.trim().is_empty() {
            missing.push("userId");
        }
        if !missing.is_empty() {
            return Err(BillingError::missing(missing));
        }

        let user_id = UserId::new(cmd.user_id)?;
        let email = cmd.customer_email.filter(|e| !e.trim().is_empty());
        let customer_id = self.ensure_customer(&user_id, email).await?;

        let return_url = cmd
            .return_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.default_return_url.clone());

        let session = self
            .provider
            .create_checkout_session(CreateCheckoutRequest {
                customer_id: customer_id.clone(),
                price_id: cmd.price_id.trim().to_string(),
                user_id: user_id.clone(),
                success_url: success_url(&return_url),
                cancel_url: cancel_url(&return_url),
            })
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Failed to create checkout session");
                BillingError::from(e)
            })?;

        tracing::info!(
            user_id = %user_id,
            customer_id = %customer_id,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(CreateCheckoutSessionResult {
            session_id: session.id,
            url: session.url,
            customer_id,
        })
    }

    /// Returns the member's provider customer id, creating and linking one
    /// if none exists.
    ///
    /// Serialized per user; the provider call is idempotent per user and
    /// the first stored customer wins, so concurrent attempts converge on a
    /// single customer.
    async fn ensure_customer(
        &self,
        user_id: &UserId,
        email: Option<String>,
    ) -> Result<String, BillingError> {
        let _guard = self.locks.lock(user_id.as_str()).await;

        let profile = self.profiles.find(user_id).await.map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Failed to load profile");
            BillingError::from(e)
        })?;
        if let Some(customer_id) = profile.and_then(|p| p.stripe_customer_id) {
            self.backfill_customer(user_id, &customer_id, email).await?;
            return Ok(customer_id);
        }

        // A stored mapping without a profile link means a previous attempt
        // stopped halfway.
        if let Some(existing) = self.customers.find_by_user(user_id).await? {
            self.profiles
                .link_customer(user_id, &existing.stripe_customer_id)
                .await?;
            return Ok(existing.stripe_customer_id);
        }

        let customer = self
            .provider
            .create_customer(CreateCustomerRequest {
                user_id: user_id.clone(),
                email: email.clone(),
                idempotency_key: customer_idempotency_key(user_id),
            })
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Failed to create customer");
                BillingError::from(e)
            })?;

        let stored = self
            .customers
            .insert_if_absent(&CustomerRecord::new(user_id.clone(), customer.id.clone(), email))
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Failed to store customer");
                BillingError::from(e)
            })?;
        if stored.stripe_customer_id != customer.id {
            tracing::warn!(
                user_id = %user_id,
                created = %customer.id,
                kept = %stored.stripe_customer_id,
                "Customer already provisioned by another writer"
            );
        }

        self.profiles
            .link_customer(user_id, &stored.stripe_customer_id)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Failed to link customer");
                BillingError::from(e)
            })?;

        tracing::info!(
            user_id = %user_id,
            customer_id = %stored.stripe_customer_id,
            "Customer provisioned"
        );
        Ok(stored.stripe_customer_id)
    }

    /// Records the customer of a profile linked outside checkout, so webhook
    /// events for it can be attributed.
    async fn backfill_customer(
        &self,
        user_id: &UserId,
        customer_id: &str,
        email: Option<String>,
    ) -> Result<(), BillingError> {
        let record = CustomerRecord::new(user_id.clone(), customer_id, email);
        match self.customers.insert_if_absent(&record).await {
            Ok(stored) if stored.stripe_customer_id != customer_id => {
                tracing::warn!(
                    user_id = %user_id,
                    linked = customer_id,
                    recorded = %stored.stripe_customer_id,
                    "Profile link and customer record disagree"
                );
                Ok(())
            }
            Ok(_) => Ok(()),
            // The customer is recorded against another user; leave it there.
            Err(e) if e.code == ErrorCode::Conflict => {
                tracing::warn!(
                    user_id = %user_id,
                    linked = customer_id,
                    error = %e,
                    "Linked customer already recorded"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to record linked customer");
                Err(BillingError::from(e))
            }
        }
    }
}

fn with_query(base: &str, query: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base, separator, query)
}

/// `{CHECKOUT_SESSION_ID}` is substituted by the provider.
fn success_url(return_url: &str) -> String {
    with_query(return_url, "checkout=success&session_id={CHECKOUT_SESSION_ID}")
}

fn cancel_url(return_url: &str) -> String {
    with_query(return_url, "checkout=canceled")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryBillingProvider, InMemoryRecordStore};
    use crate::domain::billing::ProfileRecord;
    use crate::ports::ProviderError;

    struct Fixture {
        store: InMemoryRecordStore,
        provider: InMemoryBillingProvider,
        handler: Arc<CreateCheckoutSessionHandler>,
    }

    fn fixture() -> Fixture {
        let store = InMemoryRecordStore::new();
        let provider = InMemoryBillingProvider::new();
        let handler = Arc::new(CreateCheckoutSessionHandler::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(provider.clone()),
            Arc::new(KeyedLocks::new()),
            "http://localhost:3000/dashboard",
        ));
        Fixture {
            store,
            provider,
            handler,
        }
    }

    fn command(user: &str) -> CreateCheckoutSessionCommand {
        CreateCheckoutSessionCommand {
            price_id: "price_123".to_string(),
            user_id: user.to_string(),
            customer_email: Some("a@b.com".to_string()),
            return_url: None,
        }
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn new_user_gets_one_customer_and_one_session() {
        let f = fixture();

        let result = f.handler.handle(command("u1")).await.unwrap();

        assert!(result.url.starts_with("https://checkout.stripe.test/"));
        assert_eq!(f.provider.customers().len(), 1);
        assert_eq!(f.provider.checkouts().len(), 1);
        assert_eq!(f.store.customer_count(), 1);
        assert_eq!(
            f.store.profile(&user("u1")).unwrap().stripe_customer_id,
            Some(result.customer_id)
        );
    }

    #[tokio::test]
    async fn checkout_carries_user_reference_and_urls() {
        let f = fixture();
        f.handler.handle(command("u1")).await.unwrap();

        let checkout = &f.provider.checkouts()[0];
        assert_eq!(checkout.price_id, "price_123");
        assert_eq!(checkout.user_id, "u1");
        assert_eq!(
            checkout.success_url,
            "http://localhost:3000/dashboard?checkout=success&session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(
            checkout.cancel_url,
            "http://localhost:3000/dashboard?checkout=canceled"
        );
    }

    #[tokio::test]
    async fn explicit_return_url_is_used() {
        let f = fixture();
        let mut cmd = command("u1");
        cmd.return_url = Some("https://app.example/pricing?plan=driven".to_string());
        f.handler.handle(cmd).await.unwrap();

        assert_eq!(
            f.provider.checkouts()[0].cancel_url,
            "https://app.example/pricing?plan=driven&checkout=canceled"
        );
    }

    #[tokio::test]
    async fn linked_profile_reuses_customer() {
        let f = fixture();
        f.store.insert_profile(ProfileRecord {
            user_id: user("u1"),
            stripe_customer_id: Some("cus_existing".to_string()),
        });

        let result = f.handler.handle(command("u1")).await.unwrap();

        assert_eq!(result.customer_id, "cus_existing");
        assert_eq!(f.provider.customer_create_calls(), 0);
    }

    #[tokio::test]
    async fn linked_profile_gets_customer_record() {
        let f = fixture();
        f.store.insert_profile(ProfileRecord {
            user_id: user("u1"),
            stripe_customer_id: Some("cus_existing".to_string()),
        });

        f.handler.handle(command("u1")).await.unwrap();
        f.handler.handle(command("u1")).await.unwrap();

        assert_eq!(f.store.customer_count(), 1);
        assert_eq!(
            CustomerRepository::find_user_by_customer_id(&f.store, "cus_existing")
                .await
                .unwrap(),
            Some(user("u1"))
        );
    }

    #[tokio::test]
    async fn stored_mapping_repairs_profile_link() {
        let f = fixture();
        f.store
            .insert_if_absent(&CustomerRecord::new(user("u1"), "cus_half", None))
            .await
            .unwrap();

        let result = f.handler.handle(command("u1")).await.unwrap();

        assert_eq!(result.customer_id, "cus_half");
        assert_eq!(f.provider.customer_create_calls(), 0);
        assert_eq!(
            f.store.profile(&user("u1")).unwrap().stripe_customer_id.as_deref(),
            Some("cus_half")
        );
    }

    #[tokio::test]
    async fn missing_fields_are_listed() {
        let f = fixture();
        let err = f
            .handler
            .handle(CreateCheckoutSessionCommand {
                price_id: " ".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err, BillingError::missing(vec!["priceId", "userId"]));
        assert_eq!(f.provider.customer_create_calls(), 0);
    }

    #[tokio::test]
    async fn provider_failure_surfaces_message() {
        let f = fixture();
        f.provider.fail_next(ProviderError::new(
            crate::ports::ProviderErrorCode::InvalidRequest,
            "No such price: 'price_123'",
        ));

        let err = f.handler.handle(command("u1")).await.unwrap_err();
        assert_eq!(err, BillingError::provider("No such price: 'price_123'"));
        assert_eq!(f.store.customer_count(), 0);
    }

    #[tokio::test]
    async fn store_failure_is_store_error() {
        let f = fixture();
        f.store.set_fail_writes(true);

        let err = f.handler.handle(command("u1")).await.unwrap_err();
        assert!(matches!(err, BillingError::Store(_)));
        assert!(f.provider.checkouts().is_empty());
    }

    #[tokio::test]
    async fn concurrent_checkouts_provision_one_customer() {
        let f = fixture();

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let handler = f.handler.clone();
            tasks.push(tokio::spawn(async move { handler.handle(command("u1")).await }));
        }
        let mut customer_ids = Vec::new();
        for task in tasks {
            customer_ids.push(task.await.unwrap().unwrap().customer_id);
        }

        customer_ids.dedup();
        assert_eq!(customer_ids.len(), 1);
        assert_eq!(f.provider.customers().len(), 1);
        assert_eq!(f.store.customer_count(), 1);
        assert_eq!(f.provider.checkouts().len(), 10);
    }

    #[test]
    fn query_is_appended_with_correct_separator() {
        assert_eq!(with_query("http://a/b", "x=1"), "http://a/b?x=1");
        assert_eq!(with_query("http://a/b?y=2", "x=1"), "http://a/b?y=2&x=1");
    }
}
