//! Payment-provider webhook processing.
//!
//! Receivers verify the delivery signature over the raw body, normalize
//! the provider envelope into a [`WebhookEvent`], and hand it to the
//! dispatcher, which mutates the order projection. Every handled delivery
//! is acknowledged with 200 and a JSON body describing what happened;
//! only signature failures (401) and uncaught errors (500) differ.

pub mod event;
pub mod signature;

pub use event::{parse_coinbase, parse_lemonsqueezy, parse_stripe, WebhookDelivery, WebhookEvent};
pub use signature::{verify_hex_hmac, verify_stripe_signature};

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::services::orders::{OrderPatch, OrderStore};

/// Outcome of one named event handler, echoed back to the provider.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// True when payment is confirmed but the eSIM still needs to be
    /// provisioned downstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_processing: Option<bool>,
}

impl HandlerResult {
    fn ok(order_id: String) -> Self {
        Self {
            success: true,
            order_id: Some(order_id),
            error: None,
            message: None,
            needs_processing: None,
        }
    }

    fn failed(error: &str) -> Self {
        Self {
            success: false,
            order_id: None,
            error: Some(error.to_string()),
            message: None,
            needs_processing: None,
        }
    }
}

/// Body of a webhook acknowledgment.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<HandlerResult>,
}

impl WebhookResponse {
    fn acknowledged(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            result: None,
        }
    }

    fn handled(message: &str, result: HandlerResult) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            result: Some(result),
        }
    }
}

/// Routes verified webhook deliveries to the order projection.
#[derive(Clone)]
pub struct WebhookDispatcher {
    store: Arc<dyn OrderStore>,
}

impl WebhookDispatcher {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// `payment_method` is the tag written onto the order (stripe,
    /// coinbase, lemonsqueezy).
    pub async fn dispatch(
        &self,
        payment_method: &str,
        delivery: WebhookDelivery,
    ) -> Result<WebhookResponse, ServiceError> {
        match &delivery.event {
            WebhookEvent::OrderCreated => {
                let result = self.order_created(payment_method, &delivery).await?;
                Ok(WebhookResponse::handled("Order created", result))
            }
            WebhookEvent::OrderPaid => {
                let result = self.order_paid(payment_method, &delivery).await?;
                Ok(WebhookResponse::handled("Payment successful", result))
            }
            WebhookEvent::PaymentFailed => {
                let result = self.payment_failed(payment_method, &delivery).await?;
                Ok(WebhookResponse::handled("Payment failed", result))
            }
            WebhookEvent::OrderRefunded => {
                // Acknowledged only; refunds are reconciled manually.
                info!(order_id = ?delivery.order_id, "refund event received");
                Ok(WebhookResponse::acknowledged("Order refunded"))
            }
            WebhookEvent::SubscriptionLifecycle(name) => {
                info!(event = %name, "subscription lifecycle event received");
                Ok(WebhookResponse::acknowledged("Subscription event received"))
            }
            WebhookEvent::Unknown(name) => {
                info!(event = %name, "unhandled webhook event type");
                Ok(WebhookResponse::acknowledged(
                    "Event received but not processed",
                ))
            }
        }
    }

    async fn order_created(
        &self,
        payment_method: &str,
        delivery: &WebhookDelivery,
    ) -> Result<HandlerResult, ServiceError> {
        let Some(order_id) = delivery.order_id.as_deref() else {
            warn!("webhook order_created without order_id in custom data");
            return Ok(HandlerResult::failed("No order_id in custom data"));
        };

        let patch = OrderPatch {
            payment_method: Some(payment_method.to_string()),
            payment_status: Some("pending".to_string()),
            provider_order_id: delivery.provider_order_id.clone(),
            provider_payload: Some(delivery.payload.clone()),
            payment_created_at: Some(Utc::now()),
            ..Default::default()
        };

        self.store.upsert_merge(order_id, patch).await?;
        info!(order_id, "order updated with provider payment info");
        Ok(HandlerResult::ok(order_id.to_string()))
    }

    async fn order_paid(
        &self,
        payment_method: &str,
        delivery: &WebhookDelivery,
    ) -> Result<HandlerResult, ServiceError> {
        let Some(order_id) = delivery.order_id.as_deref() else {
            warn!("webhook order_paid without order_id in custom data");
            return Ok(HandlerResult::failed("No order_id in custom data"));
        };

        let Some(existing) = self.store.get(order_id).await? else {
            warn!(order_id, "payment confirmation for unknown order");
            return Ok(HandlerResult::failed("Order not found"));
        };

        let patch = OrderPatch {
            payment_method: Some(payment_method.to_string()),
            payment_status: Some("confirmed".to_string()),
            provider_order_id: delivery.provider_order_id.clone(),
            provider_payload: Some(delivery.payload.clone()),
            payment_confirmed_at: Some(Utc::now()),
            ..Default::default()
        };
        self.store.merge_existing(order_id, patch).await?;

        // Re-delivered confirmations for an already-provisioned order only
        // re-assert the payment status.
        let already_processed = existing.status.as_deref() == Some("active")
            && existing.processing_status.as_deref() == Some("completed");
        if already_processed {
            info!(order_id, "payment confirmed, order already processed");
            return Ok(HandlerResult {
                message: Some("Payment confirmed, order already processed".to_string()),
                ..HandlerResult::ok(order_id.to_string())
            });
        }

        info!(order_id, "payment confirmed");
        Ok(HandlerResult {
            needs_processing: Some(existing.reseller_order_id.is_none()),
            ..HandlerResult::ok(order_id.to_string())
        })
    }

    async fn payment_failed(
        &self,
        payment_method: &str,
        delivery: &WebhookDelivery,
    ) -> Result<HandlerResult, ServiceError> {
        let Some(order_id) = delivery.order_id.as_deref() else {
            return Ok(HandlerResult::failed("No order_id in custom data"));
        };

        if self.store.get(order_id).await?.is_none() {
            return Ok(HandlerResult::failed("Order not found"));
        }

        let patch = OrderPatch {
            payment_method: Some(payment_method.to_string()),
            payment_status: Some("failed".to_string()),
            provider_payload: Some(delivery.payload.clone()),
            ..Default::default()
        };
        self.store.merge_existing(order_id, patch).await?;
        warn!(order_id, "payment failed");
        Ok(HandlerResult::ok(order_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::orders::InMemoryOrderStore;
    use serde_json::json;

    fn paid_delivery(order_id: Option<&str>) -> WebhookDelivery {
        WebhookDelivery {
            event: WebhookEvent::OrderPaid,
            order_id: order_id.map(str::to_string),
            provider_order_id: Some("ls-777".to_string()),
            payload: json!({"id": "ls-777"}),
        }
    }

    #[tokio::test]
    async fn order_created_upserts_a_pending_order() {
        let store = Arc::new(InMemoryOrderStore::new());
        let dispatcher = WebhookDispatcher::new(store.clone());

        let delivery = WebhookDelivery {
            event: WebhookEvent::OrderCreated,
            order_id: Some("ord-1".to_string()),
            provider_order_id: Some("ls-1".to_string()),
            payload: json!({"id": "ls-1"}),
        };

        let response = dispatcher.dispatch("lemonsqueezy", delivery).await.unwrap();
        assert!(response.success);
        assert!(response.result.unwrap().success);

        let order = store.get("ord-1").await.unwrap().unwrap();
        assert_eq!(order.payment_status.as_deref(), Some("pending"));
        assert_eq!(order.provider_order_id.as_deref(), Some("ls-1"));
        assert!(order.payment_created_at.is_some());
    }

    #[tokio::test]
    async fn order_paid_for_unknown_order_is_a_structured_failure() {
        let dispatcher = WebhookDispatcher::new(Arc::new(InMemoryOrderStore::new()));

        let response = dispatcher
            .dispatch("lemonsqueezy", paid_delivery(Some("missing")))
            .await
            .unwrap();

        // The delivery is acknowledged; the handler result carries the failure.
        assert!(response.success);
        let result = response.result.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Order not found"));
    }

    #[tokio::test]
    async fn order_paid_without_order_id_is_a_structured_failure() {
        let dispatcher = WebhookDispatcher::new(Arc::new(InMemoryOrderStore::new()));
        let response = dispatcher
            .dispatch("lemonsqueezy", paid_delivery(None))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("No order_id in custom data"));
    }

    #[tokio::test]
    async fn order_paid_confirms_and_flags_provisioning() {
        let store = Arc::new(InMemoryOrderStore::new());
        store
            .upsert_merge(
                "ord-2",
                OrderPatch {
                    email: Some("c@example.com".to_string()),
                    payment_status: Some("pending".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let dispatcher = WebhookDispatcher::new(store.clone());
        let response = dispatcher
            .dispatch("lemonsqueezy", paid_delivery(Some("ord-2")))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert!(result.success);
        assert_eq!(result.needs_processing, Some(true));

        let order = store.get("ord-2").await.unwrap().unwrap();
        assert_eq!(order.payment_status.as_deref(), Some("confirmed"));
        assert_eq!(order.email.as_deref(), Some("c@example.com"));
        assert!(order.payment_confirmed_at.is_some());
    }

    #[tokio::test]
    async fn replayed_confirmation_is_idempotent() {
        let store = Arc::new(InMemoryOrderStore::new());
        store
            .upsert_merge("ord-3", OrderPatch::default())
            .await
            .unwrap();

        let dispatcher = WebhookDispatcher::new(store.clone());
        for _ in 0..2 {
            let response = dispatcher
                .dispatch("lemonsqueezy", paid_delivery(Some("ord-3")))
                .await
                .unwrap();
            assert!(response.result.unwrap().success);
        }

        let order = store.get("ord-3").await.unwrap().unwrap();
        assert_eq!(order.payment_status.as_deref(), Some("confirmed"));
    }

    #[tokio::test]
    async fn already_provisioned_order_reports_processed() {
        let store = Arc::new(InMemoryOrderStore::new());
        store
            .upsert_merge(
                "ord-4",
                OrderPatch {
                    status: Some("active".to_string()),
                    processing_status: Some("completed".to_string()),
                    reseller_order_id: Some("airalo-1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let dispatcher = WebhookDispatcher::new(store);
        let response = dispatcher
            .dispatch("lemonsqueezy", paid_delivery(Some("ord-4")))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert!(result.success);
        assert_eq!(
            result.message.as_deref(),
            Some("Payment confirmed, order already processed")
        );
        assert!(result.needs_processing.is_none());
    }

    #[tokio::test]
    async fn unknown_event_is_acknowledged_without_processing() {
        let dispatcher = WebhookDispatcher::new(Arc::new(InMemoryOrderStore::new()));
        let delivery = WebhookDelivery {
            event: WebhookEvent::Unknown("license_key_created".to_string()),
            order_id: None,
            provider_order_id: None,
            payload: json!({}),
        };
        let response = dispatcher.dispatch("lemonsqueezy", delivery).await.unwrap();
        assert!(response.success);
        assert_eq!(response.message, "Event received but not processed");
        assert!(response.result.is_none());
    }
}
