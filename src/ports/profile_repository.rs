//! Profile repository port.
//!
//! Profiles are created at signup by the identity flow; billing only reads
//! them and links a provider customer id.

use async_trait::async_trait;

use crate::domain::billing::ProfileRecord;
use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Find a profile by user id.
    async fn find(&self, user_id: &UserId) -> Result<Option<ProfileRecord>, DomainError>;

    /// Find the profile linked to a provider customer.
    async fn find_by_customer(&self, customer_id: &str)
        -> Result<Option<ProfileRecord>, DomainError>;

    /// Link a provider customer id to the profile.
    ///
    /// Upsert keyed on the user id: creates the profile if missing.
    async fn link_customer(&self, user_id: &UserId, customer_id: &str) -> Result<(), DomainError>;
}
