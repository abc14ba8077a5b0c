//! Provider webhook envelopes, normalized into a closed event type.

use serde_json::Value;

/// Known webhook event kinds across all payment providers.
///
/// Anything a provider sends that the store does not act on lands in
/// `Unknown` and is acknowledged without processing, so providers never
/// enter retry storms over event types we ignore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    OrderCreated,
    OrderPaid,
    PaymentFailed,
    OrderRefunded,
    SubscriptionLifecycle(String),
    Unknown(String),
}

impl WebhookEvent {
    pub fn from_lemonsqueezy(name: &str) -> Self {
        match name {
            "order_created" => WebhookEvent::OrderCreated,
            "order_paid" | "subscription_payment_success" => WebhookEvent::OrderPaid,
            "order_refunded" => WebhookEvent::OrderRefunded,
            "subscription_created" | "subscription_updated" | "subscription_cancelled" => {
                WebhookEvent::SubscriptionLifecycle(name.to_string())
            }
            other => WebhookEvent::Unknown(other.to_string()),
        }
    }

    pub fn from_stripe(name: &str) -> Self {
        match name {
            "checkout.session.completed" => WebhookEvent::OrderPaid,
            "charge.refunded" => WebhookEvent::OrderRefunded,
            other => WebhookEvent::Unknown(other.to_string()),
        }
    }

    pub fn from_coinbase(name: &str) -> Self {
        match name {
            "charge:created" | "charge:pending" => WebhookEvent::OrderCreated,
            "charge:confirmed" | "charge:resolved" => WebhookEvent::OrderPaid,
            "charge:failed" | "charge:delayed" => WebhookEvent::PaymentFailed,
            other => WebhookEvent::Unknown(other.to_string()),
        }
    }
}

/// A parsed webhook delivery: the normalized event plus the correlation
/// data pulled out of the provider-specific envelope.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    pub event: WebhookEvent,
    /// Internal order id carried in the provider's custom metadata.
    pub order_id: Option<String>,
    /// Charge/session/order id on the provider side.
    pub provider_order_id: Option<String>,
    /// The resource payload, persisted onto the order for diagnostics.
    pub payload: Value,
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Lemon Squeezy envelope: `{meta:{event_name}, data:{id, attributes:{custom:{order_id}}}}`.
pub fn parse_lemonsqueezy(body: &Value) -> WebhookDelivery {
    let name = body
        .pointer("/meta/event_name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let data = body.get("data").cloned().unwrap_or(Value::Null);

    WebhookDelivery {
        event: WebhookEvent::from_lemonsqueezy(name),
        order_id: non_empty(data.pointer("/attributes/custom/order_id")),
        provider_order_id: non_empty(data.get("id")),
        payload: data,
    }
}

/// Stripe envelope: `{type, data:{object:{id, metadata:{order_id}}}}`.
pub fn parse_stripe(body: &Value) -> WebhookDelivery {
    let name = body.get("type").and_then(Value::as_str).unwrap_or_default();
    let object = body.pointer("/data/object").cloned().unwrap_or(Value::Null);

    WebhookDelivery {
        event: WebhookEvent::from_stripe(name),
        order_id: non_empty(object.pointer("/metadata/order_id")),
        provider_order_id: non_empty(object.get("id")),
        payload: object,
    }
}

/// Coinbase envelope: `{event:{type, data:{id, code, metadata:{order_id}}}}`.
pub fn parse_coinbase(body: &Value) -> WebhookDelivery {
    let event = body.get("event").unwrap_or(body);
    let name = event.get("type").and_then(Value::as_str).unwrap_or_default();
    let data = event.get("data").cloned().unwrap_or(Value::Null);

    WebhookDelivery {
        event: WebhookEvent::from_coinbase(name),
        order_id: non_empty(data.pointer("/metadata/order_id")),
        provider_order_id: non_empty(data.get("code")).or_else(|| non_empty(data.get("id"))),
        payload: data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lemonsqueezy_paid_event_parses_correlation() {
        let body = json!({
            "meta": {"event_name": "order_paid"},
            "data": {
                "id": "123456",
                "attributes": {"custom": {"order_id": "ord-9", "plan_id": "plan-1"}}
            }
        });
        let delivery = parse_lemonsqueezy(&body);
        assert_eq!(delivery.event, WebhookEvent::OrderPaid);
        assert_eq!(delivery.order_id.as_deref(), Some("ord-9"));
        assert_eq!(delivery.provider_order_id.as_deref(), Some("123456"));
    }

    #[test]
    fn lemonsqueezy_subscription_payment_maps_to_order_paid() {
        assert_eq!(
            WebhookEvent::from_lemonsqueezy("subscription_payment_success"),
            WebhookEvent::OrderPaid
        );
    }

    #[test]
    fn unknown_names_stay_unknown() {
        assert_eq!(
            WebhookEvent::from_lemonsqueezy("license_key_created"),
            WebhookEvent::Unknown("license_key_created".to_string())
        );
        assert_eq!(
            WebhookEvent::from_stripe("invoice.created"),
            WebhookEvent::Unknown("invoice.created".to_string())
        );
    }

    #[test]
    fn stripe_checkout_completed_parses_metadata() {
        let body = json!({
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_test_1", "metadata": {"order_id": "ord-2"}}}
        });
        let delivery = parse_stripe(&body);
        assert_eq!(delivery.event, WebhookEvent::OrderPaid);
        assert_eq!(delivery.order_id.as_deref(), Some("ord-2"));
        assert_eq!(delivery.provider_order_id.as_deref(), Some("cs_test_1"));
    }

    #[test]
    fn coinbase_confirmed_charge_parses_code() {
        let body = json!({
            "event": {
                "type": "charge:confirmed",
                "data": {"id": "uuid-1", "code": "CHARGE1", "metadata": {"order_id": "ord-3"}}
            }
        });
        let delivery = parse_coinbase(&body);
        assert_eq!(delivery.event, WebhookEvent::OrderPaid);
        assert_eq!(delivery.order_id.as_deref(), Some("ord-3"));
        assert_eq!(delivery.provider_order_id.as_deref(), Some("CHARGE1"));
    }

    #[test]
    fn missing_custom_metadata_yields_no_order_id() {
        let body = json!({"meta": {"event_name": "order_created"}, "data": {"id": "1"}});
        let delivery = parse_lemonsqueezy(&body);
        assert_eq!(delivery.event, WebhookEvent::OrderCreated);
        assert!(delivery.order_id.is_none());
    }
}
