//! HandleBillingWebhookHandler - Command handler for Stripe webhook deliveries.
//!
//! Verification failures are returned as errors and must be answered with
//! 400. Once a delivery is verified it is always acknowledged: processing
//! failures are logged with the event id and reported as
//! `WebhookOutcome::Failed`, leaving redelivery to the provider.

use std::sync::Arc;

use crate::domain::billing::{
    BillingError, CheckoutSessionObject, InvoiceObject, ProfileRecord, StatusChange, StripeEvent,
    StripeEventType, SubscriptionStatus, UpsertOutcome, WebhookError, WebhookVerifier,
};
use crate::domain::foundation::UserId;
use crate::ports::{
    CustomerRepository, ProfileRepository, ProviderSubscription, SubscriptionRepository,
};

use super::reconcile_subscription::SubscriptionReconciler;

/// Command to handle a webhook delivery.
#[derive(Debug, Clone)]
pub struct HandleBillingWebhookCommand {
    /// Raw request body, exactly as received.
    pub payload: Vec<u8>,
    /// Value of the `stripe-signature` header.
    pub signature: Option<String>,
}

/// Why a verified event was dropped without touching the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Checkout session names no user.
    MissingUserReference,
    /// Checkout session or invoice carries no subscription.
    MissingSubscription,
    /// Event carries no customer id.
    MissingCustomer,
    /// Neither a customer record nor a profile links the event's customer
    /// to a user.
    UnmappedCustomer,
}

/// What a verified delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The subscription was fetched and upserted.
    Reconciled {
        event_id: String,
        subscription_id: String,
        outcome: UpsertOutcome,
    },
    /// The mirrored subscription was marked canceled.
    Canceled {
        event_id: String,
        subscription_id: String,
    },
    /// Terminal no-op.
    Dropped { event_id: String, reason: DropReason },
    /// Event type not handled by this service.
    Ignored { event_id: String, event_type: String },
    /// Processing failed after verification.
    Failed { event_id: String, message: String },
}

/// Handler for webhook deliveries.
pub struct HandleBillingWebhookHandler {
    verifier: Arc<WebhookVerifier>,
    customers: Arc<dyn CustomerRepository>,
    profiles: Arc<dyn ProfileRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    reconciler: Arc<SubscriptionReconciler>,
}

impl HandleBillingWebhookHandler {
    pub fn new(
        verifier: Arc<WebhookVerifier>,
        customers: Arc<dyn CustomerRepository>,
        profiles: Arc<dyn ProfileRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        reconciler: Arc<SubscriptionReconciler>,
    ) -> Self {
        Self {
            verifier,
            customers,
            profiles,
            subscriptions,
            reconciler,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandleBillingWebhookCommand,
    ) -> Result<WebhookOutcome, WebhookError> {
        let signature = cmd
            .signature
            .as_deref()
            .ok_or(WebhookError::MissingSignature)
            .and_then(|header| self.verifier.verify_and_parse(&cmd.payload, header));
        let event = match signature {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected webhook delivery");
                return Err(e);
            }
        };

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            livemode = event.livemode,
            "Webhook received"
        );

        match self.dispatch(&event).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %e,
                    "Webhook processing failed"
                );
                Ok(WebhookOutcome::Failed {
                    event_id: event.id.clone(),
                    message: e.message(),
                })
            }
        }
    }

    async fn dispatch(&self, event: &StripeEvent) -> Result<WebhookOutcome, BillingError> {
        match event.parsed_type() {
            StripeEventType::CheckoutSessionCompleted => self.on_checkout_completed(event).await,
            StripeEventType::InvoicePaid => self.on_invoice_paid(event).await,
            StripeEventType::CustomerSubscriptionUpdated => {
                self.on_subscription_updated(event).await
            }
            StripeEventType::CustomerSubscriptionDeleted => {
                self.on_subscription_deleted(event).await
            }
            StripeEventType::Unhandled => {
                tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring event");
                Ok(WebhookOutcome::Ignored {
                    event_id: event.id.clone(),
                    event_type: event.event_type.clone(),
                })
            }
        }
    }

    async fn on_checkout_completed(&self, event: &StripeEvent) -> Result<WebhookOutcome, BillingError> {
        let session: CheckoutSessionObject = parse_object(event)?;

        let Some(user_ref) = session.user_reference() else {
            return Ok(dropped(event, DropReason::MissingUserReference));
        };
        let user_id = UserId::new(user_ref)?;

        let Some(subscription_id) = session.subscription.as_deref() else {
            return Ok(dropped(event, DropReason::MissingSubscription));
        };

        self.reconcile(event, &user_id, subscription_id).await
    }

    async fn on_invoice_paid(&self, event: &StripeEvent) -> Result<WebhookOutcome, BillingError> {
        let invoice: InvoiceObject = parse_object(event)?;

        let user_id = match self.resolve_user(event, invoice.customer.as_deref()).await? {
            Ok(user_id) => user_id,
            Err(reason) => return Ok(dropped(event, reason)),
        };
        let Some(subscription_id) = invoice.subscription_id() else {
            return Ok(dropped(event, DropReason::MissingSubscription));
        };

        self.reconcile(event, &user_id, subscription_id).await
    }

    async fn on_subscription_updated(
        &self,
        event: &StripeEvent,
    ) -> Result<WebhookOutcome, BillingError> {
        let subscription: ProviderSubscription = parse_object(event)?;

        let user_id = match self.resolve_user(event, Some(&subscription.customer)).await? {
            Ok(user_id) => user_id,
            Err(reason) => return Ok(dropped(event, reason)),
        };

        self.reconcile(event, &user_id, &subscription.id).await
    }

    async fn on_subscription_deleted(
        &self,
        event: &StripeEvent,
    ) -> Result<WebhookOutcome, BillingError> {
        let subscription: ProviderSubscription = parse_object(event)?;

        let user_id = match self.resolve_user(event, Some(&subscription.customer)).await? {
            Ok(user_id) => user_id,
            Err(reason) => return Ok(dropped(event, reason)),
        };

        let applied = self
            .subscriptions
            .apply_status_change(&subscription.id, StatusChange::deleted(event.created))
            .await?;

        if !applied {
            // Never mirrored: record the ended subscription from the payload.
            let mut snapshot = SubscriptionReconciler::snapshot_from_provider(
                user_id.clone(),
                &subscription,
                event.created,
            );
            snapshot.status = SubscriptionStatus::Canceled;
            snapshot.cancel_at_period_end = false;
            self.reconciler.store(snapshot).await?;
        }

        tracing::info!(
            event_id = %event.id,
            user_id = %user_id,
            subscription_id = %subscription.id,
            "Subscription canceled"
        );
        Ok(WebhookOutcome::Canceled {
            event_id: event.id.clone(),
            subscription_id: subscription.id,
        })
    }

    async fn reconcile(
        &self,
        event: &StripeEvent,
        user_id: &UserId,
        subscription_id: &str,
    ) -> Result<WebhookOutcome, BillingError> {
        let outcome = self
            .reconciler
            .reconcile(user_id, subscription_id, event.created)
            .await?;

        Ok(WebhookOutcome::Reconciled {
            event_id: event.id.clone(),
            subscription_id: subscription_id.to_string(),
            outcome,
        })
    }

    /// Resolve the user mapped to `customer_id`, or the reason to drop.
    ///
    /// The customer record is authoritative. Profiles linked outside
    /// checkout (at signup, or by an earlier system) have no record, so the
    /// profile link is consulted next.
    async fn resolve_user(
        &self,
        event: &StripeEvent,
        customer_id: Option<&str>,
    ) -> Result<Result<UserId, DropReason>, BillingError> {
        let Some(customer_id) = customer_id.filter(|c| !c.is_empty()) else {
            return Ok(Err(DropReason::MissingCustomer));
        };

        if let Some(user_id) = self.customers.find_user_by_customer_id(customer_id).await? {
            return Ok(Ok(user_id));
        }

        match self.profiles.find_by_customer(customer_id).await? {
            Some(ProfileRecord { user_id, .. }) => {
                tracing::info!(
                    event_id = %event.id,
                    customer_id,
                    user_id = %user_id,
                    "Customer attributed through profile link"
                );
                Ok(Ok(user_id))
            }
            None => {
                tracing::warn!(
                    event_id = %event.id,
                    customer_id,
                    "No user mapped to customer"
                );
                Ok(Err(DropReason::UnmappedCustomer))
            }
        }
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(event: &StripeEvent) -> Result<T, BillingError> {
    event
        .deserialize_object()
        .map_err(|e| BillingError::validation("data.object", e.to_string()))
}

fn dropped(event: &StripeEvent, reason: DropReason) -> WebhookOutcome {
    tracing::info!(event_id = %event.id, event_type = %event.event_type, reason = ?reason, "Dropping event");
    WebhookOutcome::Dropped {
        event_id: event.id.clone(),
        reason,
    }
}
