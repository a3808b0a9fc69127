//! Startup wiring: builds every client once from configuration and hands
//! them to the HTTP layer.

use std::sync::Arc;

use thiserror::Error;

use crate::adapters::http::BillingAppState;
use crate::adapters::memory::InMemoryRecordStore;
use crate::adapters::postgres::{
    self, PostgresCustomerRepository, PostgresProfileRepository, PostgresSubscriptionRepository,
};
use crate::adapters::postgrest::{PostgrestClient, PostgrestRecordStore};
use crate::adapters::stripe::{StripeBillingProvider, StripeConfig};
use crate::application::handlers::billing::KeyedLocks;
use crate::config::{AppConfig, ConfigError, StoreBackend, ValidationError};
use crate::domain::billing::WebhookVerifier;
use crate::domain::foundation::DomainError;
use crate::ports::{CustomerRepository, ProfileRepository, SubscriptionRepository};

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Record store unavailable: {0}")]
    Store(#[from] DomainError),
}

impl From<ValidationError> for StartupError {
    fn from(err: ValidationError) -> Self {
        StartupError::Config(ConfigError::from(err))
    }
}

/// Record store clients, one per repository port.
struct Repositories {
    profiles: Arc<dyn ProfileRepository>,
    customers: Arc<dyn CustomerRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl Repositories {
    fn shared<T>(store: T) -> Self
    where
        T: ProfileRepository + CustomerRepository + SubscriptionRepository + 'static,
    {
        let store = Arc::new(store);
        Self {
            profiles: store.clone(),
            customers: store.clone(),
            subscriptions: store,
        }
    }
}

/// Build the shared application state from validated configuration.
pub async fn build_state(config: &AppConfig) -> Result<BillingAppState, StartupError> {
    let repositories = connect_store(config).await?;

    let provider = StripeBillingProvider::new(StripeConfig::from(&config.payment));
    let verifier = WebhookVerifier::new(config.payment.stripe_webhook_secret.clone())
        .with_require_livemode(config.payment.require_livemode);

    if config.payment.is_test_mode() && config.server.is_production() {
        tracing::warn!("Stripe test-mode key configured in production");
    }

    Ok(BillingAppState {
        profiles: repositories.profiles,
        customers: repositories.customers,
        subscriptions: repositories.subscriptions,
        provider: Arc::new(provider),
        verifier: Arc::new(verifier),
        customer_locks: Arc::new(KeyedLocks::new()),
        dashboard_url: config.server.dashboard_url(),
        allow_tier_preview: config.features.allow_tier_preview,
    })
}

async fn connect_store(config: &AppConfig) -> Result<Repositories, StartupError> {
    let backend = config.store.backend()?;
    tracing::info!(backend = ?backend, "Connecting record store");

    match backend {
        StoreBackend::Rest => {
            let service_key = config
                .store
                .service_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or(ValidationError::MissingRequired("STORE_SERVICE_KEY"))?;
            let client = PostgrestClient::new(config.store.url.clone(), service_key);
            Ok(Repositories::shared(PostgrestRecordStore::new(client)))
        }
        StoreBackend::Postgres => {
            let pool = postgres::connect(&config.store).await?;
            Ok(Repositories {
                profiles: Arc::new(PostgresProfileRepository::new(pool.clone())),
                customers: Arc::new(PostgresCustomerRepository::new(pool.clone())),
                subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool)),
            })
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory record store; data is lost on restart");
            Ok(Repositories::shared(InMemoryRecordStore::new()))
        }
    }
}
