//! Member profile and billing customer records.

use crate::domain::foundation::{Timestamp, UserId};

/// Identity record of a member, as far as billing is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    pub user_id: UserId,
    pub stripe_customer_id: Option<String>,
}

/// Link between a member and their billing-provider customer.
///
/// Unique on both `user_id` and `stripe_customer_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRecord {
    pub user_id: UserId,
    pub stripe_customer_id: String,
    pub email: Option<String>,
    pub created_at: Timestamp,
}

impl CustomerRecord {
    pub fn new(user_id: UserId, stripe_customer_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            user_id,
            stripe_customer_id: stripe_customer_id.into(),
            email,
            created_at: Timestamp::now(),
        }
    }
}

/// Idempotency key sent with customer creation.
///
/// Stable per user so that concurrent or retried checkouts converge on a
/// single provider customer.
pub fn customer_idempotency_key(user_id: &UserId) -> String {
    format!("fairway-customer-{}", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable_per_user() {
        let user = UserId::new("u1").unwrap();
        assert_eq!(customer_idempotency_key(&user), "fairway-customer-u1");
        assert_eq!(customer_idempotency_key(&user), customer_idempotency_key(&user));
    }
}
