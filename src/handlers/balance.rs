//! Reseller balance endpoint, gated by bearer authentication.

use axum::{
    extract::State,
    http::{header, HeaderMap},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::handlers::AppState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub success: bool,
    pub balance: f64,
    pub has_insufficient_funds: bool,
    pub minimum_required: f64,
    pub mode: String,
}

/// Fetch the reseller account balance
#[utoipa::path(
    get,
    path = "/api/user/balance",
    responses(
        (status = 200, description = "Current reseller balance", body = BalanceResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::errors::ErrorResponse),
        (status = 504, description = "Reseller API timeout", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Balance"
)]
pub async fn get_balance(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BalanceResponse>, ServiceError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let identity = state.identity.verify_header(auth_header)?;
    debug!(user_id = %identity.user_id, "balance requested");

    let summary = state.reseller.balance().await?;
    Ok(Json(BalanceResponse {
        success: true,
        balance: summary.balance,
        has_insufficient_funds: summary.has_insufficient_funds,
        minimum_required: summary.minimum_required,
        mode: "production".to_string(),
    }))
}

pub fn balance_routes() -> Router<AppState> {
    Router::new().route("/api/user/balance", get(get_balance))
}
