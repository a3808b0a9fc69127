//! Mirrored subscription status.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Status of a mirrored subscription.
///
/// A closed set: the provider's own `active`, `trialing`, `past_due`,
/// `canceled`, `incomplete`, `incomplete_expired` and `unpaid`, plus
/// `canceling` for a live subscription scheduled to end at period end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Canceling,
    Incomplete,
    IncompleteExpired,
    Unpaid,
}

impl SubscriptionStatus {
    /// Maps a provider status string into the closed set.
    ///
    /// A live subscription flagged `cancel_at_period_end` becomes `Canceling`.
    /// Unrecognized values (including the provider's `paused`) map to
    /// `Incomplete`, which grants no access.
    pub fn from_provider(raw: &str, cancel_at_period_end: bool) -> Self {
        let status = match raw.parse::<SubscriptionStatus>() {
            Ok(status) => status,
            Err(_) => {
                tracing::warn!(provider_status = raw, "Unrecognized subscription status");
                SubscriptionStatus::Incomplete
            }
        };

        if cancel_at_period_end && status.is_live() {
            SubscriptionStatus::Canceling
        } else {
            status
        }
    }

    /// Returns true if the subscription currently grants its tier.
    pub fn has_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active
                | SubscriptionStatus::Trialing
                | SubscriptionStatus::PastDue
                | SubscriptionStatus::Canceling
        )
    }

    /// Returns true if the subscription can never become active again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Canceled | SubscriptionStatus::IncompleteExpired
        )
    }

    fn is_live(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing | SubscriptionStatus::PastDue
        )
    }

    /// Snake-case storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Canceling => "canceling",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Unpaid => "unpaid",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            // Accept the British spelling some dashboards emit
            "canceled" | "cancelled" => Ok(SubscriptionStatus::Canceled),
            "canceling" => Ok(SubscriptionStatus::Canceling),
            "incomplete" => Ok(SubscriptionStatus::Incomplete),
            "incomplete_expired" => Ok(SubscriptionStatus::IncompleteExpired),
            "unpaid" => Ok(SubscriptionStatus::Unpaid),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}
