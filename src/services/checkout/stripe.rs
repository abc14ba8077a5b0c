//! Stripe Checkout sessions.
//!
//! Sessions are created through the form-encoded
//! `POST /v1/checkout/sessions` API. A request carrying the yearly flag
//! becomes a subscription session; everything else is a one-time payment.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use super::{to_cents, upstream_error};
use crate::config::AppConfig;
use crate::credentials::{CredentialKey, CredentialResolver, Provider};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SessionRequest {
    /// Internal order id, carried back through session metadata.
    #[validate(length(min = 1))]
    pub order: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub total: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    /// Storefront origin the customer is redirected back to.
    #[validate(length(min = 1))]
    pub domain: String,
    #[serde(default)]
    pub plan: Option<String>,
    /// Present (true or false) only for subscription checkouts.
    #[serde(rename = "isYearly", default)]
    pub is_yearly: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct StripeSession {
    pub session_url: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: String,
}

/// Builds the form body for `POST /v1/checkout/sessions`.
pub fn build_session_form(req: &SessionRequest) -> Result<Vec<(String, String)>, ServiceError> {
    if req.domain.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Domain is required".to_string(),
        ));
    }
    let unit_amount = to_cents(req.total)?;
    let domain = req.domain.trim_end_matches('/');
    let currency = req
        .currency
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or("usd")
        .to_lowercase();

    let mut form: Vec<(String, String)> = vec![
        ("payment_method_types[0]".into(), "card".into()),
        (
            "line_items[0][price_data][currency]".into(),
            currency.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]".into(),
            unit_amount.to_string(),
        ),
        ("line_items[0][quantity]".into(), "1".into()),
        ("customer_email".into(), req.email.clone()),
    ];

    match req.is_yearly {
        Some(is_yearly) => {
            let interval = if is_yearly { "year" } else { "month" };
            let cadence = if is_yearly { "Annual" } else { "Monthly" };
            form.extend([
                (
                    "line_items[0][price_data][product_data][name]".into(),
                    format!("Subscription Plan - {}", req.order),
                ),
                (
                    "line_items[0][price_data][product_data][description]".into(),
                    format!("{} subscription plan", cadence),
                ),
                (
                    "line_items[0][price_data][recurring][interval]".into(),
                    interval.into(),
                ),
                (
                    "line_items[0][price_data][recurring][interval_count]".into(),
                    "1".into(),
                ),
                ("mode".into(), "subscription".into()),
                (
                    "success_url".into(),
                    format!(
                        "{}/subscription-success?session_id={{CHECKOUT_SESSION_ID}}&plan={}",
                        domain, req.order
                    ),
                ),
                ("cancel_url".into(), format!("{}/subscriptions", domain)),
                ("billing_address_collection".into(), "required".into()),
                ("allow_promotion_codes".into(), "true".into()),
                (
                    "subscription_data[description]".into(),
                    format!("{} subscription for {}", cadence, req.email),
                ),
                (
                    "subscription_data[metadata][order_id]".into(),
                    req.order.clone(),
                ),
                (
                    "subscription_data[metadata][plan_type]".into(),
                    if is_yearly { "yearly" } else { "monthly" }.into(),
                ),
            ]);
        }
        None => {
            form.extend([
                (
                    "line_items[0][price_data][product_data][name]".into(),
                    format!("Order {}", req.order),
                ),
                ("mode".into(), "payment".into()),
                (
                    "success_url".into(),
                    format!(
                        "{}/payment-success?order={}&email={}&total={}&name={}&currency={}",
                        domain,
                        req.order,
                        req.email,
                        req.total,
                        req.name.as_deref().unwrap_or_default(),
                        currency
                    ),
                ),
                ("cancel_url".into(), format!("{}/cart", domain)),
                ("metadata[order_id]".into(), req.order.clone()),
                ("metadata[email]".into(), req.email.clone()),
                (
                    "metadata[name]".into(),
                    req.name.clone().unwrap_or_default(),
                ),
                (
                    "metadata[plan_id]".into(),
                    req.plan.clone().unwrap_or_default(),
                ),
            ]);
        }
    }

    Ok(form)
}

#[derive(Clone)]
pub struct StripeCheckout {
    credentials: Arc<CredentialResolver>,
    http: reqwest::Client,
    api_url: String,
    test_mode: bool,
}

impl StripeCheckout {
    pub fn new(
        credentials: Arc<CredentialResolver>,
        http: reqwest::Client,
        config: &AppConfig,
    ) -> Self {
        Self {
            credentials,
            http,
            api_url: config.stripe_api_url.clone(),
            test_mode: config.stripe_uses_test_mode(),
        }
    }

    pub async fn create_session(
        &self,
        req: &SessionRequest,
    ) -> Result<StripeSession, ServiceError> {
        let form = build_session_form(req)?;
        let key = if self.test_mode {
            CredentialKey::TestSecretKey
        } else {
            CredentialKey::LiveSecretKey
        };
        let secret = self.credentials.resolve(Provider::Stripe, key).await?;

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_url))
            .bearer_auth(secret)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let session: SessionResponse = response.json().await?;
        info!(order = %req.order, session = %session.id, "stripe checkout session created");
        Ok(StripeSession {
            session_url: session.url,
            session_id: session.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> SessionRequest {
        SessionRequest {
            order: "ord-1".to_string(),
            email: "c@example.com".to_string(),
            name: Some("Europe 5GB".to_string()),
            total: dec!(12.5),
            currency: None,
            domain: "https://store.example.com/".to_string(),
            plan: Some("plan-eu-5".to_string()),
            is_yearly: None,
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn one_time_payment_form() {
        let form = build_session_form(&request()).unwrap();
        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(
            value(&form, "line_items[0][price_data][unit_amount]"),
            Some("1250")
        );
        assert_eq!(
            value(&form, "line_items[0][price_data][currency]"),
            Some("usd")
        );
        assert_eq!(value(&form, "metadata[order_id]"), Some("ord-1"));
        assert_eq!(value(&form, "metadata[plan_id]"), Some("plan-eu-5"));
        assert_eq!(value(&form, "cancel_url"), Some("https://store.example.com/cart"));
        let success = value(&form, "success_url").unwrap();
        assert!(success.starts_with("https://store.example.com/payment-success?order=ord-1"));
    }

    #[test]
    fn yearly_flag_selects_subscription_mode() {
        let mut req = request();
        req.is_yearly = Some(true);
        let form = build_session_form(&req).unwrap();
        assert_eq!(value(&form, "mode"), Some("subscription"));
        assert_eq!(
            value(&form, "line_items[0][price_data][recurring][interval]"),
            Some("year")
        );
        assert_eq!(
            value(&form, "subscription_data[metadata][plan_type]"),
            Some("yearly")
        );
        let success = value(&form, "success_url").unwrap();
        assert!(success.contains("{CHECKOUT_SESSION_ID}"));
    }

    #[test]
    fn explicit_false_yearly_is_still_a_subscription() {
        let mut req = request();
        req.is_yearly = Some(false);
        let form = build_session_form(&req).unwrap();
        assert_eq!(value(&form, "mode"), Some("subscription"));
        assert_eq!(
            value(&form, "line_items[0][price_data][recurring][interval]"),
            Some("month")
        );
    }

    #[test]
    fn missing_domain_and_amount_are_validation_errors() {
        let mut req = request();
        req.domain = "  ".to_string();
        assert!(matches!(
            build_session_form(&req),
            Err(ServiceError::ValidationError(_))
        ));

        let mut req = request();
        req.total = Decimal::ZERO;
        assert!(matches!(
            build_session_form(&req),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
