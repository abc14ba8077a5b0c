//! Lemon Squeezy hosted checkouts, created through the JSON:API
//! `POST /v1/checkouts` endpoint.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use url::form_urlencoded;

use super::{to_cents, upstream_error, CheckoutOrder};
use crate::config::AppConfig;
use crate::credentials::{CredentialKey, CredentialResolver, Provider};
use crate::errors::ServiceError;

const JSON_API: &str = "application/vnd.api+json";

/// Builds the JSON:API checkout body. The internal order id rides in
/// `checkout_data.custom` and comes back in webhook deliveries.
pub fn build_checkout_payload(
    order: &CheckoutOrder,
    redirect_url: Option<&str>,
    app_url: &str,
    store_id: &str,
) -> Result<Value, ServiceError> {
    let custom_price = to_cents(order.amount)?;
    let plan_name = order.plan_name_or_default();
    let currency = order.currency_or_usd().to_lowercase();

    let success_url = match redirect_url.filter(|u| !u.trim().is_empty()) {
        Some(url) => url.to_string(),
        None => {
            let params = form_urlencoded::Serializer::new(String::new())
                .append_pair("payment_method", "lemonsqueezy")
                .append_pair("order_id", &order.order_id)
                .append_pair("email", &order.customer_email)
                .append_pair("total", &order.amount.to_string())
                .append_pair("currency", &currency)
                .append_pair("plan", order.plan_id.as_deref().unwrap_or_default())
                .append_pair("name", &plan_name)
                .finish();
            format!(
                "{}/payment-success?{}",
                app_url.trim_end_matches('/'),
                params
            )
        }
    };

    Ok(json!({
        "data": {
            "type": "checkouts",
            "attributes": {
                "custom_price": custom_price,
                "product_options": {
                    "name": plan_name,
                    "description": format!("eSIM data plan purchase - {}", plan_name),
                    "redirect_url": success_url,
                    "receipt_button_text": "View eSIM",
                    "receipt_link_url": success_url,
                    "receipt_thank_you_note":
                        "Thank you for your purchase! Your eSIM will be activated shortly.",
                },
                "checkout_options": {
                    "embed": false,
                    "media": false,
                    "logo": false,
                },
                "checkout_data": {
                    "email": order.customer_email,
                    "custom": {
                        "order_id": order.order_id,
                        "plan_id": order.plan_id,
                        "plan_name": order.plan_name,
                        "user_id": order.user_id,
                    },
                },
                "expires_at": Value::Null,
                "preview": false,
                "test_mode": false,
            },
            "relationships": {
                "store": {
                    "data": {
                        "type": "stores",
                        "id": store_id,
                    }
                }
            }
        }
    }))
}

#[derive(Clone)]
pub struct LemonSqueezyCheckouts {
    credentials: Arc<CredentialResolver>,
    http: reqwest::Client,
    api_url: String,
    app_url: String,
}

impl LemonSqueezyCheckouts {
    pub fn new(
        credentials: Arc<CredentialResolver>,
        http: reqwest::Client,
        config: &AppConfig,
    ) -> Self {
        Self {
            credentials,
            http,
            api_url: config.lemonsqueezy_api_url.clone(),
            app_url: config.app_url.clone(),
        }
    }

    /// Creates a hosted checkout and returns the provider's checkout
    /// resource.
    pub async fn create_checkout(
        &self,
        order: &CheckoutOrder,
        redirect_url: Option<&str>,
    ) -> Result<Value, ServiceError> {
        let api_key = self
            .credentials
            .resolve(Provider::LemonSqueezy, CredentialKey::ApiKey)
            .await?;
        let store_id = self
            .credentials
            .resolve(Provider::LemonSqueezy, CredentialKey::StoreId)
            .await?;

        let payload = build_checkout_payload(order, redirect_url, &self.app_url, &store_id)?;

        let response = self
            .http
            .post(format!("{}/v1/checkouts", self.api_url))
            .bearer_auth(api_key)
            .header(reqwest::header::ACCEPT, JSON_API)
            .header(reqwest::header::CONTENT_TYPE, JSON_API)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let body: Value = response.json().await?;
        let checkout = body.get("data").cloned().unwrap_or(body);
        info!(
            order_id = %order.order_id,
            checkout = checkout.get("id").and_then(serde_json::Value::as_str).unwrap_or_default(),
            "lemon squeezy checkout created"
        );
        Ok(checkout)
    }
}
