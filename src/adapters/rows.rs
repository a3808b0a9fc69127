//! Table row shapes shared by the record-store adapters.
//!
//! The same rows are read by sqlx (`FromRow`) and exchanged as JSON with the
//! hosted REST gateway (`serde`), so both persistent adapters agree on the
//! column names in `migrations/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::billing::{CustomerRecord, ProfileRecord, SubscriptionRecord};
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionRecordId, Timestamp, UserId};

/// `profiles` row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
}

/// `customers` row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomerRow {
    pub user_id: String,
    pub stripe_customer_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// `subscriptions` row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: String,
    pub stripe_subscription_id: String,
    pub status: String,
    pub tier: String,
    #[serde(default)]
    pub current_period_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub provider_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn parse_user_id(raw: String) -> Result<UserId, DomainError> {
    UserId::new(raw).map_err(|e| {
        DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
    })
}

impl TryFrom<ProfileRow> for ProfileRecord {
    type Error = DomainError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(ProfileRecord {
            user_id: parse_user_id(row.id)?,
            stripe_customer_id: row.stripe_customer_id,
        })
    }
}

impl TryFrom<CustomerRow> for CustomerRecord {
    type Error = DomainError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(CustomerRecord {
            user_id: parse_user_id(row.user_id)?,
            stripe_customer_id: row.stripe_customer_id,
            email: row.email,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

impl From<&CustomerRecord> for CustomerRow {
    fn from(record: &CustomerRecord) -> Self {
        Self {
            user_id: record.user_id.to_string(),
            stripe_customer_id: record.stripe_customer_id.clone(),
            email: record.email.clone(),
            created_at: *record.created_at.as_datetime(),
        }
    }
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid status value: {}", e),
            )
        })?;
        let tier = row.tier.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid tier value: {}", e))
        })?;

        Ok(SubscriptionRecord {
            id: SubscriptionRecordId::from_uuid(row.id),
            user_id: parse_user_id(row.user_id)?,
            provider_subscription_id: row.stripe_subscription_id,
            status,
            tier,
            current_period_start: row.current_period_start.map(Timestamp::from_datetime),
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            cancel_at_period_end: row.cancel_at_period_end,
            provider_version: row.provider_version,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

impl From<&SubscriptionRecord> for SubscriptionRow {
    fn from(record: &SubscriptionRecord) -> Self {
        Self {
            id: *record.id.as_uuid(),
            user_id: record.user_id.to_string(),
            stripe_subscription_id: record.provider_subscription_id.clone(),
            status: record.status.as_str().to_string(),
            tier: record.tier.as_str().to_string(),
            current_period_start: record.current_period_start.map(|t| *t.as_datetime()),
            current_period_end: record.current_period_end.map(|t| *t.as_datetime()),
            cancel_at_period_end: record.cancel_at_period_end,
            provider_version: record.provider_version,
            created_at: *record.created_at.as_datetime(),
            updated_at: *record.updated_at.as_datetime(),
        }
    }
}
