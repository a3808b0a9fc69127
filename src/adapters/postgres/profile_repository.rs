//! PostgreSQL implementation of ProfileRepository.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::adapters::rows::ProfileRow;
use crate::domain::billing::ProfileRecord;
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::ProfileRepository;

use super::db_error;

pub struct PostgresProfileRepository {
    pool: PgPool,
}

impl PostgresProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<ProfileRecord>, DomainError> {
        let row: Option<ProfileRow> =
            sqlx::query_as("SELECT id, stripe_customer_id FROM profiles WHERE id = $1")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to find profile", e))?;

        row.map(ProfileRecord::try_from).transpose()
    }

    async fn find_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<ProfileRecord>, DomainError> {
        let row: Option<ProfileRow> = sqlx::query_as(
            "SELECT id, stripe_customer_id FROM profiles WHERE stripe_customer_id = $1 LIMIT 1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find profile by customer", e))?;

        row.map(ProfileRecord::try_from).transpose()
    }

    async fn link_customer(&self, user_id: &UserId, customer_id: &str) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, stripe_customer_id, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (id) DO UPDATE SET
                stripe_customer_id = EXCLUDED.stripe_customer_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user_id.as_str())
        .bind(customer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to link customer to profile", e))?;

        Ok(())
    }
}
