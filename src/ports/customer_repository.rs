//! Customer repository port.

use async_trait::async_trait;

use crate::domain::billing::CustomerRecord;
use crate::domain::foundation::{DomainError, UserId};

/// Persistence for user ↔ provider-customer links.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Insert the link unless the user already has one.
    ///
    /// Returns the stored record: the new one, or the existing one when the
    /// user was linked concurrently. The first link always wins.
    async fn insert_if_absent(&self, record: &CustomerRecord) -> Result<CustomerRecord, DomainError>;

    /// Find the link for a user.
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<CustomerRecord>, DomainError>;

    /// Resolve the owner of a provider customer.
    async fn find_user_by_customer_id(&self, customer_id: &str) -> Result<Option<UserId>, DomainError>;
}
