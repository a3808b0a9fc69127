//! Record store configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Record store configuration.
///
/// The URL scheme selects the backend:
/// - `https://` / `http://` - hosted PostgREST endpoint, requires `service_key`
/// - `postgres://` / `postgresql://` - direct PostgreSQL connection
/// - `memory://` - process-local store for development
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Store URL
    #[serde(default)]
    pub url: String,

    /// Service-role key for the hosted REST endpoint
    pub service_key: Option<String>,

    /// Minimum connections to maintain (postgres backend)
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Maximum connections allowed (postgres backend)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in seconds (postgres backend)
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Run migrations on startup (postgres backend)
    #[serde(default)]
    pub run_migrations: bool,
}

/// Backend selected by the store URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Rest,
    Postgres,
    Memory,
}

impl StoreConfig {
    /// Determine the backend from the URL scheme
    pub fn backend(&self) -> Result<StoreBackend, ValidationError> {
        let url = self.url.as_str();
        if url.starts_with("https://") || url.starts_with("http://") {
            Ok(StoreBackend::Rest)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(StoreBackend::Postgres)
        } else if url.starts_with("memory://") {
            Ok(StoreBackend::Memory)
        } else {
            Err(ValidationError::UnsupportedStoreUrl)
        }
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Validate store configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("STORE_URL"));
        }

        if self.backend()? == StoreBackend::Rest
            && self.service_key.as_deref().map_or(true, str::is_empty)
        {
            return Err(ValidationError::MissingRequired("STORE_SERVICE_KEY"));
        }

        if self.min_connections > self.max_connections {
            return Err(ValidationError::InvalidPoolSize);
        }
        if self.max_connections > 100 {
            return Err(ValidationError::PoolSizeTooLarge);
        }

        Ok(())
    }
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    5
}
