//! Service configuration
//!
//! Typed settings read from the process environment (and `.env` in
//! development) through `config` and `dotenvy`. Keys carry the
//! `FAIRWAY_` prefix and nested values use double underscores as separators.
//! The conventional flat variables used by hosting platforms (`PORT`,
//! `STRIPE_SECRET_KEY`, `STORE_URL`, ...) are honored as overrides.
//!
//! # Example
//!
//! ```no_run
//! use fairway_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod error;
mod features;
mod payment;
mod server;
mod store;

pub use error::{ConfigError, ValidationError};
pub use features::FeatureFlags;
pub use payment::PaymentConfig;
pub use server::{Environment, LogFormat, ServerConfig};
pub use store::{StoreBackend, StoreConfig};

use serde::Deserialize;

/// Flat environment variables mapped onto nested configuration keys.
const CONVENTIONAL_VARS: &[(&str, &str)] = &[
    ("PORT", "server.port"),
    ("CLIENT_URL", "server.client_url"),
    ("STRIPE_SECRET_KEY", "payment.stripe_secret_key"),
    ("STRIPE_WEBHOOK_SECRET", "payment.stripe_webhook_secret"),
    ("STORE_URL", "store.url"),
    ("STORE_SERVICE_KEY", "store.service_key"),
];

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, client URL)
    #[serde(default)]
    pub server: ServerConfig,

    /// Record store configuration (hosted REST, PostgreSQL or in-memory)
    #[serde(default)]
    pub store: StoreConfig,

    /// Payment configuration (Stripe)
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Feature flags
    #[serde(default)]
    pub features: FeatureFlags,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `FAIRWAY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Applies flat conventional variables on top
    /// 5. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `FAIRWAY__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `FAIRWAY__STORE__URL=...` -> `store.url = ...`
    /// - `STRIPE_WEBHOOK_SECRET=...` -> `payment.stripe_webhook_secret = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder().add_source(
            config::Environment::default()
                .prefix("FAIRWAY")
                .separator("__"),
        );

        for (var, key) in CONVENTIONAL_VARS {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        let config = builder.build()?.try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    /// A missing store URL or service key is reported here.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.store.validate()?;
        self.payment.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
