//! Mirrored subscription record and the snapshots that update it.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{SubscriptionRecordId, Timestamp, UserId};

use super::status::SubscriptionStatus;
use super::tier::MembershipTier;

/// Normalized view of a provider subscription, ready to be upserted.
///
/// `version` is the `created` epoch of the provider event that produced the
/// snapshot. The store rejects snapshots older than the stored version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub user_id: UserId,
    pub provider_subscription_id: String,
    pub status: SubscriptionStatus,
    pub tier: MembershipTier,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub version: i64,
}

/// Mirror of one provider subscription.
///
/// At most one record exists per `provider_subscription_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: SubscriptionRecordId,
    pub user_id: UserId,
    pub provider_subscription_id: String,
    pub status: SubscriptionStatus,
    pub tier: MembershipTier,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub provider_version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Result of upserting a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed; one was created.
    Inserted,
    /// The existing record was overwritten.
    Updated,
    /// The stored record carries a newer version; nothing was written.
    Stale,
}

/// Direct status change that bypasses reconciliation.
///
/// Used for deletions and locally-initiated cancellations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: SubscriptionStatus,
    /// `None` leaves the stored flag untouched.
    pub cancel_at_period_end: Option<bool>,
    /// Event version to record; the stored version never decreases.
    pub version: Option<i64>,
}

impl StatusChange {
    /// Provider reported the subscription as deleted.
    pub fn deleted(version: i64) -> Self {
        Self {
            status: SubscriptionStatus::Canceled,
            cancel_at_period_end: Some(false),
            version: Some(version),
        }
    }

    /// Member asked to cancel at the end of the current period.
    pub fn canceling() -> Self {
        Self {
            status: SubscriptionStatus::Canceling,
            cancel_at_period_end: Some(true),
            version: None,
        }
    }
}

impl SubscriptionRecord {
    /// Creates a new record from a snapshot.
    pub fn from_snapshot(snapshot: &SubscriptionSnapshot, now: Timestamp) -> Self {
        Self {
            id: SubscriptionRecordId::new(),
            user_id: snapshot.user_id.clone(),
            provider_subscription_id: snapshot.provider_subscription_id.clone(),
            status: snapshot.status,
            tier: snapshot.tier,
            current_period_start: snapshot.current_period_start,
            current_period_end: snapshot.current_period_end,
            cancel_at_period_end: snapshot.cancel_at_period_end,
            provider_version: snapshot.version,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if a snapshot with `version` may overwrite this record.
    ///
    /// Equal versions are accepted so that redelivery is idempotent.
    pub fn accepts_version(&self, version: i64) -> bool {
        version >= self.provider_version
    }

    /// Overwrites mutable fields from a snapshot, keeping identity and
    /// creation time.
    ///
    /// Returns `UpsertOutcome::Stale` without modifying the record when the
    /// snapshot is older than the stored version.
    pub fn apply_snapshot(&mut self, snapshot: &SubscriptionSnapshot, now: Timestamp) -> UpsertOutcome {
        if !self.accepts_version(snapshot.version) {
            return UpsertOutcome::Stale;
        }

        self.user_id = snapshot.user_id.clone();
        self.status = snapshot.status;
        self.tier = snapshot.tier;
        self.current_period_start = snapshot.current_period_start;
        self.current_period_end = snapshot.current_period_end;
        self.cancel_at_period_end = snapshot.cancel_at_period_end;
        self.provider_version = snapshot.version;
        self.updated_at = now;
        UpsertOutcome::Updated
    }

    /// Applies a direct status change.
    pub fn apply_status_change(&mut self, change: StatusChange, now: Timestamp) {
        self.status = change.status;
        if let Some(flag) = change.cancel_at_period_end {
            self.cancel_at_period_end = flag;
        }
        if let Some(version) = change.version {
            self.provider_version = self.provider_version.max(version);
        }
        self.updated_at = now;
    }
}
