//! Checkout/charge creation against the payment providers.
//!
//! Each provider module separates the pure payload builder from the
//! submitting client, so request shapes are unit-testable without a
//! network. Non-2xx provider responses surface as
//! [`ServiceError::UpstreamError`] with the upstream status and body
//! preserved.

pub mod coinbase;
pub mod lemonsqueezy;
pub mod stripe;

pub use coinbase::CoinbaseCharges;
pub use lemonsqueezy::LemonSqueezyCheckouts;
pub use stripe::StripeCheckout;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;

/// Normalized order data accepted by the charge builders.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOrder {
    #[validate(length(min = 1))]
    pub order_id: String,
    #[validate(email)]
    pub customer_email: String,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl CheckoutOrder {
    pub fn currency_or_usd(&self) -> String {
        self.currency
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("USD")
            .to_string()
    }

    pub fn plan_name_or_default(&self) -> String {
        self.plan_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("eSIM Plan")
            .to_string()
    }
}

/// Whole minor units for providers that price in cents.
pub(crate) fn to_cents(amount: Decimal) -> Result<i64, ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Total amount is required".to_string(),
        ));
    }
    (amount * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| ServiceError::ValidationError("Total amount is out of range".to_string()))
}

/// Drains a failed provider response into an `UpstreamError`.
pub(crate) async fn upstream_error(response: reqwest::Response) -> ServiceError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ServiceError::UpstreamError { status, body }
}
