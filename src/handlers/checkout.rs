//! Checkout/charge creation endpoints, one per payment provider.

use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::checkout::{stripe::SessionRequest, CheckoutOrder};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    pub session_url: String,
    pub session_id: String,
    pub total: Decimal,
    pub currency: String,
    pub status: String,
}

/// Create a Stripe Checkout session
#[utoipa::path(
    post,
    path = "/api/payments/create-checkout-session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutSessionResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 500, description = "Provider not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<CheckoutSessionResponse>, ServiceError> {
    request.validate()?;
    let session = state.stripe.create_session(&request).await?;
    Ok(Json(CheckoutSessionResponse {
        session_url: session.session_url,
        session_id: session.session_id,
        total: request.total,
        currency: request.currency.unwrap_or_else(|| "usd".to_string()),
        status: "success".to_string(),
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCheckoutRequest {
    pub order_data: CheckoutOrder,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChargeResponse {
    pub success: bool,
    /// The provider's charge resource, passed through verbatim.
    pub charge: Value,
}

/// Create a Coinbase Commerce charge
#[utoipa::path(
    post,
    path = "/api/coinbase/create-charge",
    request_body = ProviderCheckoutRequest,
    responses(
        (status = 200, description = "Charge created", body = ChargeResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 500, description = "Provider not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_coinbase_charge(
    State(state): State<AppState>,
    Json(request): Json<ProviderCheckoutRequest>,
) -> Result<Json<ChargeResponse>, ServiceError> {
    request.order_data.validate()?;
    let charge = state
        .coinbase
        .create_charge(&request.order_data, request.redirect_url.as_deref())
        .await?;
    Ok(Json(ChargeResponse {
        success: true,
        charge,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LemonSqueezyCheckoutResponse {
    pub success: bool,
    /// The provider's checkout resource, passed through verbatim.
    pub checkout: Value,
}

/// Create a Lemon Squeezy hosted checkout
#[utoipa::path(
    post,
    path = "/api/lemonsqueezy/create-checkout",
    request_body = ProviderCheckoutRequest,
    responses(
        (status = 200, description = "Checkout created", body = LemonSqueezyCheckoutResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 500, description = "Provider not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_lemonsqueezy_checkout(
    State(state): State<AppState>,
    Json(request): Json<ProviderCheckoutRequest>,
) -> Result<Json<LemonSqueezyCheckoutResponse>, ServiceError> {
    request.order_data.validate()?;
    let checkout = state
        .lemonsqueezy
        .create_checkout(&request.order_data, request.redirect_url.as_deref())
        .await?;
    Ok(Json(LemonSqueezyCheckoutResponse {
        success: true,
        checkout,
    }))
}

pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/payments/create-checkout-session",
            post(create_checkout_session),
        )
        .route("/api/coinbase/create-charge", post(create_coinbase_charge))
        .route(
            "/api/lemonsqueezy/create-checkout",
            post(create_lemonsqueezy_checkout),
        )
}
