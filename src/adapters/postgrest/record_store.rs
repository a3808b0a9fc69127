//! Record-store ports over a hosted PostgREST gateway.
//!
//! The gateway cannot express a conditional upsert in one call, so the
//! subscription upsert is a guarded `PATCH` (`provider_version=lte.<v>`)
//! followed by an insert that ignores duplicates. If the insert loses a race
//! to another writer, the guarded `PATCH` is retried once; an empty result
//! then means the stored row is newer.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::adapters::rows::{CustomerRow, ProfileRow, SubscriptionRow};
use crate::domain::billing::{
    CustomerRecord, ProfileRecord, StatusChange, SubscriptionRecord, SubscriptionSnapshot,
    UpsertOutcome,
};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::{CustomerRepository, ProfileRepository, SubscriptionRepository};

use super::client::PostgrestClient;
use super::query::Query;

const PROFILES: &str = "profiles";
const CUSTOMERS: &str = "customers";
const SUBSCRIPTIONS: &str = "subscriptions";

/// Record store backed by PostgREST.
#[derive(Clone)]
pub struct PostgrestRecordStore {
    client: PostgrestClient,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    user_id: String,
}

impl PostgrestRecordStore {
    pub fn new(client: PostgrestClient) -> Self {
        Self { client }
    }

    fn snapshot_patch(snapshot: &SubscriptionSnapshot) -> serde_json::Value {
        json!({
            "user_id": snapshot.user_id.as_str(),
            "status": snapshot.status.as_str(),
            "tier": snapshot.tier.as_str(),
            "current_period_start": snapshot.current_period_start.map(|t| *t.as_datetime()),
            "current_period_end": snapshot.current_period_end.map(|t| *t.as_datetime()),
            "cancel_at_period_end": snapshot.cancel_at_period_end,
            "provider_version": snapshot.version,
            "updated_at": Utc::now(),
        })
    }

    async fn guarded_update(&self, snapshot: &SubscriptionSnapshot) -> Result<bool, DomainError> {
        let query = Query::table(SUBSCRIPTIONS)
            .eq("stripe_subscription_id", &snapshot.provider_subscription_id)
            .lte("provider_version", snapshot.version);
        let updated: Vec<SubscriptionRow> = self
            .client
            .update(&query, &Self::snapshot_patch(snapshot))
            .await?;
        Ok(!updated.is_empty())
    }
}

#[async_trait]
impl ProfileRepository for PostgrestRecordStore {
    async fn find(&self, user_id: &UserId) -> Result<Option<ProfileRecord>, DomainError> {
        let query = Query::table(PROFILES)
            .select("id,stripe_customer_id")
            .eq("id", user_id)
            .limit(1);
        let rows: Vec<ProfileRow> = self.client.select(&query).await?;
        rows.into_iter().next().map(ProfileRecord::try_from).transpose()
    }

    async fn find_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<ProfileRecord>, DomainError> {
        let query = Query::table(PROFILES)
            .select("id,stripe_customer_id")
            .eq("stripe_customer_id", customer_id)
            .limit(1);
        let rows: Vec<ProfileRow> = self.client.select(&query).await?;
        rows.into_iter().next().map(ProfileRecord::try_from).transpose()
    }

    async fn link_customer(&self, user_id: &UserId, customer_id: &str) -> Result<(), DomainError> {
        let body = json!([{
            "id": user_id.as_str(),
            "stripe_customer_id": customer_id,
            "updated_at": Utc::now(),
        }]);
        let _: Vec<ProfileRow> = self
            .client
            .insert(&Query::table(PROFILES).on_conflict("id"), &body, "merge-duplicates")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for PostgrestRecordStore {
    async fn insert_if_absent(&self, record: &CustomerRecord) -> Result<CustomerRecord, DomainError> {
        let rows: Vec<CustomerRow> = self
            .client
            .insert(
                &Query::table(CUSTOMERS).on_conflict("user_id"),
                &[CustomerRow::from(record)],
                "ignore-duplicates",
            )
            .await?;

        match rows.into_iter().next() {
            Some(row) => CustomerRecord::try_from(row),
            None => self.find_by_user(&record.user_id).await?.ok_or_else(|| {
                DomainError::database("customer row vanished after insert conflict")
            }),
        }
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<CustomerRecord>, DomainError> {
        let query = Query::table(CUSTOMERS)
            .select("user_id,stripe_customer_id,email,created_at")
            .eq("user_id", user_id)
            .limit(1);
        let rows: Vec<CustomerRow> = self.client.select(&query).await?;
        rows.into_iter().next().map(CustomerRecord::try_from).transpose()
    }

    async fn find_user_by_customer_id(&self, customer_id: &str) -> Result<Option<UserId>, DomainError> {
        let query = Query::table(CUSTOMERS)
            .select("user_id")
            .eq("stripe_customer_id", customer_id)
            .limit(1);
        let rows: Vec<UserRef> = self.client.select(&query).await?;

        rows.into_iter()
            .next()
            .map(|r| {
                UserId::new(r.user_id).map_err(|e| {
                    DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
                })
            })
            .transpose()
    }
}

#[async_trait]
impl SubscriptionRepository for PostgrestRecordStore {
    async fn upsert(&self, snapshot: &SubscriptionSnapshot) -> Result<UpsertOutcome, DomainError> {
        if self.guarded_update(snapshot).await? {
            return Ok(UpsertOutcome::Updated);
        }

        let row = SubscriptionRow::from(&SubscriptionRecord::from_snapshot(
            snapshot,
            Timestamp::now(),
        ));
        let inserted: Vec<SubscriptionRow> = self
            .client
            .insert(
                &Query::table(SUBSCRIPTIONS).on_conflict("stripe_subscription_id"),
                &[row],
                "ignore-duplicates",
            )
            .await?;
        if !inserted.is_empty() {
            return Ok(UpsertOutcome::Inserted);
        }

        // Row exists: either a newer version, or a concurrent insert won.
        if self.guarded_update(snapshot).await? {
            Ok(UpsertOutcome::Updated)
        } else {
            Ok(UpsertOutcome::Stale)
        }
    }

    async fn apply_status_change(
        &self,
        provider_subscription_id: &str,
        change: StatusChange,
    ) -> Result<bool, DomainError> {
        let Some(mut record) = self.find_by_provider_id(provider_subscription_id).await? else {
            return Ok(false);
        };
        record.apply_status_change(change, Timestamp::now());

        let body = json!({
            "status": record.status.as_str(),
            "cancel_at_period_end": record.cancel_at_period_end,
            "provider_version": record.provider_version,
            "updated_at": record.updated_at.as_datetime(),
        });
        let updated: Vec<SubscriptionRow> = self
            .client
            .update(
                &Query::table(SUBSCRIPTIONS).eq("stripe_subscription_id", provider_subscription_id),
                &body,
            )
            .await?;
        Ok(!updated.is_empty())
    }

    async fn find_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let query = Query::table(SUBSCRIPTIONS)
            .select("*")
            .eq("stripe_subscription_id", provider_subscription_id)
            .limit(1);
        let rows: Vec<SubscriptionRow> = self.client.select(&query).await?;
        rows.into_iter()
            .next()
            .map(SubscriptionRecord::try_from)
            .transpose()
    }

    async fn find_current_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let query = Query::table(SUBSCRIPTIONS)
            .select("*")
            .eq("user_id", user_id)
            .order_desc("updated_at");
        let rows: Vec<SubscriptionRow> = self.client.select(&query).await?;
        let records = rows
            .into_iter()
            .map(SubscriptionRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pick_current(records))
    }
}

/// First access-granting record, else the most recently updated one.
/// Expects records ordered newest first.
fn pick_current(records: Vec<SubscriptionRecord>) -> Option<SubscriptionRecord> {
    let position = records
        .iter()
        .position(|r| r.status.has_access())
        .unwrap_or(0);
    records.into_iter().nth(position)
}
