//! PostgreSQL implementation of SubscriptionRepository.
//!
//! The upsert is a single statement: `ON CONFLICT ... DO UPDATE ... WHERE`
//! skips the update when the stored `provider_version` is newer, in which
//! case no row is returned and the snapshot is reported stale.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::adapters::rows::SubscriptionRow;
use crate::domain::billing::{
    StatusChange, SubscriptionRecord, SubscriptionSnapshot, UpsertOutcome,
};
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::ports::SubscriptionRepository;

use super::db_error;

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, stripe_subscription_id, status, tier,
           current_period_start, current_period_end, cancel_at_period_end,
           provider_version, created_at, updated_at
    FROM subscriptions
"#;

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn upsert(&self, snapshot: &SubscriptionSnapshot) -> Result<UpsertOutcome, DomainError> {
        let row = SubscriptionRow::from(&SubscriptionRecord::from_snapshot(
            snapshot,
            Timestamp::now(),
        ));

        // xmax is zero only for freshly inserted tuples
        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            INSERT INTO subscriptions (
                id, user_id, stripe_subscription_id, status, tier,
                current_period_start, current_period_end, cancel_at_period_end,
                provider_version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (stripe_subscription_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                status = EXCLUDED.status,
                tier = EXCLUDED.tier,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                provider_version = EXCLUDED.provider_version,
                updated_at = EXCLUDED.updated_at
            WHERE subscriptions.provider_version <= EXCLUDED.provider_version
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(row.id)
        .bind(&row.user_id)
        .bind(&row.stripe_subscription_id)
        .bind(&row.status)
        .bind(&row.tier)
        .bind(row.current_period_start)
        .bind(row.current_period_end)
        .bind(row.cancel_at_period_end)
        .bind(row.provider_version)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to upsert subscription", e))?;

        Ok(match inserted {
            Some(true) => UpsertOutcome::Inserted,
            Some(false) => UpsertOutcome::Updated,
            None => UpsertOutcome::Stale,
        })
    }

    async fn apply_status_change(
        &self,
        provider_subscription_id: &str,
        change: StatusChange,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                status = $2,
                cancel_at_period_end = COALESCE($3, cancel_at_period_end),
                provider_version = GREATEST(provider_version, COALESCE($4, provider_version)),
                updated_at = $5
            WHERE stripe_subscription_id = $1
            "#,
        )
        .bind(provider_subscription_id)
        .bind(change.status.as_str())
        .bind(change.cancel_at_period_end)
        .bind(change.version)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update subscription status", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("{} WHERE stripe_subscription_id = $1", SELECT_COLUMNS))
                .bind(provider_subscription_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to find subscription", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn find_current_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            r#"{}
            WHERE user_id = $1
            ORDER BY status IN ('active', 'trialing', 'past_due', 'canceling') DESC,
                     updated_at DESC
            LIMIT 1
            "#,
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find current subscription", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }
}
