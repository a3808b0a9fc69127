//! PostgreSQL adapters - sqlx implementations of the record-store ports.
//!
//! - `PostgresProfileRepository` - `profiles`
//! - `PostgresCustomerRepository` - `customers`
//! - `PostgresSubscriptionRepository` - `subscriptions`
//!
//! Schema lives in `migrations/`.

mod customer_repository;
mod profile_repository;
mod subscription_repository;

pub use customer_repository::PostgresCustomerRepository;
pub use profile_repository::PostgresProfileRepository;
pub use subscription_repository::PostgresSubscriptionRepository;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::StoreConfig;
use crate::domain::foundation::{DomainError, ErrorCode};

/// Open a connection pool and optionally apply migrations.
pub async fn connect(config: &StoreConfig) -> Result<PgPool, DomainError> {
    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(&config.url)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::StoreUnavailable,
                format!("Failed to connect to database: {}", e),
            )
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        "Database pool ready"
    );

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to run migrations: {}", e)))?;
        tracing::info!("Database migrations applied");
    }

    Ok(pool)
}

/// Map a sqlx error, surfacing pool exhaustion as `StoreUnavailable`.
pub(crate) fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            DomainError::new(ErrorCode::StoreUnavailable, format!("{}: {}", context, err))
        }
        other => DomainError::database(format!("{}: {}", context, other)),
    }
}
