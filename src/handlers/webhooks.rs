//! Webhook receiver endpoints.
//!
//! Each receiver resolves its provider's webhook secret, verifies the
//! signature over the raw body, and only then parses and dispatches. A
//! missing secret is a configuration fault (500), a bad signature is 401,
//! and no order state changes unless the signature checks out.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde_json::Value;
use tracing::warn;

use crate::credentials::{CredentialKey, Provider};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::webhooks::{
    parse_coinbase, parse_lemonsqueezy, parse_stripe, verify_hex_hmac, verify_stripe_signature,
    WebhookResponse,
};

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_body(body: &[u8]) -> Result<Value, ServiceError> {
    serde_json::from_slice(body)
        .map_err(|_| ServiceError::BadRequest("Invalid JSON payload".to_string()))
}

/// Lemon Squeezy webhook receiver
#[utoipa::path(
    post,
    path = "/api/webhooks/lemonsqueezy",
    request_body = Value,
    responses(
        (status = 200, description = "Delivery processed", body = WebhookResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 500, description = "Webhook secret not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn lemonsqueezy_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ServiceError> {
    let secret = state
        .credentials
        .resolve(Provider::LemonSqueezy, CredentialKey::WebhookSecret)
        .await?;

    let signature = header(&headers, "x-signature").unwrap_or_default();
    if signature.is_empty() || !verify_hex_hmac(&body, &secret, signature) {
        warn!("lemon squeezy webhook signature verification failed");
        return Err(ServiceError::Unauthorized("Invalid signature".to_string()));
    }

    let payload = parse_body(&body)?;
    let delivery = parse_lemonsqueezy(&payload);
    let response = state.dispatcher.dispatch("lemonsqueezy", delivery).await?;
    Ok(Json(response))
}

/// Stripe webhook receiver
#[utoipa::path(
    post,
    path = "/api/webhooks/stripe",
    request_body = Value,
    responses(
        (status = 200, description = "Delivery processed", body = WebhookResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 500, description = "Webhook secret not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ServiceError> {
    let secret = state
        .credentials
        .resolve(Provider::Stripe, CredentialKey::WebhookSecret)
        .await?;

    let signature = header(&headers, "stripe-signature").unwrap_or_default();
    let tolerance = state.config.webhook_tolerance_secs;
    if signature.is_empty() || !verify_stripe_signature(signature, &body, &secret, tolerance) {
        warn!("stripe webhook signature verification failed");
        return Err(ServiceError::Unauthorized("Invalid signature".to_string()));
    }

    let payload = parse_body(&body)?;
    let delivery = parse_stripe(&payload);
    let response = state.dispatcher.dispatch("stripe", delivery).await?;
    Ok(Json(response))
}

/// Coinbase Commerce webhook receiver
#[utoipa::path(
    post,
    path = "/api/webhooks/coinbase",
    request_body = Value,
    responses(
        (status = 200, description = "Delivery processed", body = WebhookResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 500, description = "Webhook secret not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn coinbase_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ServiceError> {
    let secret = state
        .credentials
        .resolve(Provider::Coinbase, CredentialKey::WebhookSecret)
        .await?;

    let signature = header(&headers, "x-cc-webhook-signature").unwrap_or_default();
    if signature.is_empty() || !verify_hex_hmac(&body, &secret, signature) {
        warn!("coinbase webhook signature verification failed");
        return Err(ServiceError::Unauthorized("Invalid signature".to_string()));
    }

    let payload = parse_body(&body)?;
    let delivery = parse_coinbase(&payload);
    let response = state.dispatcher.dispatch("coinbase", delivery).await?;
    Ok(Json(response))
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/api/webhooks/lemonsqueezy", post(lemonsqueezy_webhook))
        .route("/api/webhooks/stripe", post(stripe_webhook))
        .route("/api/webhooks/coinbase", post(coinbase_webhook))
}
