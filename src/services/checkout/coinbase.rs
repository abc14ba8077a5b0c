//! Coinbase Commerce charges.
//!
//! Charges are fixed-price and carry the internal order id in their
//! metadata so the webhook receiver can correlate confirmations.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use url::form_urlencoded;

use super::{upstream_error, CheckoutOrder};
use crate::config::AppConfig;
use crate::credentials::{CredentialKey, CredentialResolver, Provider};
use crate::errors::ServiceError;

const API_VERSION: &str = "2018-03-22";

/// Builds the `POST /charges` body. The redirect URL carries the order
/// correlation parameters back to the storefront.
pub fn build_charge_payload(
    order: &CheckoutOrder,
    redirect_url: Option<&str>,
    app_url: &str,
) -> Result<Value, ServiceError> {
    if order.amount <= rust_decimal::Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Total amount is required".to_string(),
        ));
    }

    let plan_name = order.plan_name_or_default();
    let currency = order.currency_or_usd();
    let base_redirect = redirect_url
        .filter(|u| !u.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}/payment-success", app_url.trim_end_matches('/')));

    let params = form_urlencoded::Serializer::new(String::new())
        .append_pair("order_id", &order.order_id)
        .append_pair("email", &order.customer_email)
        .append_pair("total", &order.amount.to_string())
        .append_pair("currency", &currency)
        .append_pair("payment_method", "coinbase")
        .finish();

    Ok(json!({
        "name": plan_name,
        "description": format!("eSIM data plan purchase - {}", plan_name),
        "local_price": {
            "amount": format!("{:.2}", order.amount),
            "currency": currency,
        },
        "pricing_type": "fixed_price",
        "metadata": {
            "order_id": order.order_id,
            "plan_id": order.plan_id,
            "customer_email": order.customer_email,
            "source": "esim_shop",
            "user_id": order.user_id,
        },
        "redirect_url": format!("{}?{}", base_redirect, params),
        "cancel_url": format!("{}/checkout", app_url.trim_end_matches('/')),
    }))
}

#[derive(Clone)]
pub struct CoinbaseCharges {
    credentials: Arc<CredentialResolver>,
    http: reqwest::Client,
    api_url: String,
    app_url: String,
}

impl CoinbaseCharges {
    pub fn new(
        credentials: Arc<CredentialResolver>,
        http: reqwest::Client,
        config: &AppConfig,
    ) -> Self {
        Self {
            credentials,
            http,
            api_url: config.coinbase_api_url.clone(),
            app_url: config.app_url.clone(),
        }
    }

    /// Creates a charge and returns the provider's charge resource.
    pub async fn create_charge(
        &self,
        order: &CheckoutOrder,
        redirect_url: Option<&str>,
    ) -> Result<Value, ServiceError> {
        let payload = build_charge_payload(order, redirect_url, &self.app_url)?;
        let api_key = self
            .credentials
            .resolve(Provider::Coinbase, CredentialKey::ApiKey)
            .await?;

        let response = self
            .http
            .post(format!("{}/charges", self.api_url))
            .header("X-CC-Api-Key", api_key.trim())
            .header("X-CC-Version", API_VERSION)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let body: Value = response.json().await?;
        let charge = body.get("data").cloned().unwrap_or(body);
        info!(
            order_id = %order.order_id,
            code = charge.get("code").and_then(serde_json::Value::as_str).unwrap_or_default(),
            "coinbase charge created"
        );
        Ok(charge)
    }
}
