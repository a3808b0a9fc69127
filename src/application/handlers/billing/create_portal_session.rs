//! CreatePortalSessionHandler - opens the provider's self-service billing
//! portal for a customer.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::ports::{BillingProvider, PortalSession};

/// Command to create a portal session.
#[derive(Debug, Clone, Default)]
pub struct CreatePortalSessionCommand {
    pub customer_id: String,
    pub return_url: Option<String>,
}

pub struct CreatePortalSessionHandler {
    provider: Arc<dyn BillingProvider>,
    default_return_url: String,
}

impl CreatePortalSessionHandler {
    pub fn new(provider: Arc<dyn BillingProvider>, default_return_url: impl Into<String>) -> Self {
        Self {
            provider,
            default_return_url: default_return_url.into(),
        }
    }

    pub async fn handle(&self, cmd: CreatePortalSessionCommand) -> Result<PortalSession, BillingError> {
        let customer_id = cmd.customer_id.trim();
        if customer_id.is_empty() {
            return Err(BillingError::missing(vec!["customerId"]));
        }

        let return_url = cmd
            .return_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.default_return_url.clone());

        self.provider
            .create_portal_session(customer_id, &return_url)
            .await
            .map_err(|e| {
                tracing::error!(customer_id, error = %e, "Failed to create portal session");
                BillingError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingProvider;

    fn handler(provider: &InMemoryBillingProvider) -> CreatePortalSessionHandler {
        CreatePortalSessionHandler::new(Arc::new(provider.clone()), "http://localhost:3000/dashboard")
    }

    #[tokio::test]
    async fn defaults_return_url_to_dashboard() {
        let provider = InMemoryBillingProvider::new();
        let session = handler(&provider)
            .handle(CreatePortalSessionCommand {
                customer_id: "cus_1".to_string(),
                return_url: None,
            })
            .await
            .unwrap();

        assert!(!session.url.is_empty());
        assert_eq!(
            provider.portal_sessions(),
            vec![("cus_1".to_string(), "http://localhost:3000/dashboard".to_string())]
        );
    }

    #[tokio::test]
    async fn uses_given_return_url() {
        let provider = InMemoryBillingProvider::new();
        handler(&provider)
            .handle(CreatePortalSessionCommand {
                customer_id: "cus_1".to_string(),
                return_url: Some("https://app.example/account".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(provider.portal_sessions()[0].1, "https://app.example/account");
    }

    #[tokio::test]
    async fn customer_is_required() {
        let provider = InMemoryBillingProvider::new();
        let err = handler(&provider)
            .handle(CreatePortalSessionCommand::default())
            .await
            .unwrap_err();
        assert_eq!(err, BillingError::missing(vec!["customerId"]));
    }
}
