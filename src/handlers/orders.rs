//! Admin order listing and updates.

use axum::{
    extract::{Json, Query, State},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entities::order;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::orders::AdminOrderUpdate;

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListQuery {
    /// Page number, 1-based
    pub page: Option<u64>,
    /// Page size
    pub limit: Option<u64>,
    /// Substring match on email, order id or ICCID
    pub search: Option<String>,
    /// Exact status filter; "all" disables it
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListResponse {
    pub success: bool,
    pub orders: Vec<order::Model>,
    pub pagination: Pagination,
}

/// List orders
#[utoipa::path(
    get,
    path = "/api/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "One page of orders", body = OrderListResponse),
        (status = 503, description = "Order store unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrderListResponse>, ServiceError> {
    let page = state
        .orders
        .list(
            query.page.unwrap_or(1),
            query.limit.unwrap_or(50),
            query.search.as_deref(),
            query.status.as_deref(),
        )
        .await?;

    Ok(Json(OrderListResponse {
        success: true,
        orders: page.orders,
        pagination: Pagination {
            page: page.page,
            limit: page.limit,
            total: page.total,
            total_pages: page.total_pages,
        },
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderUpdateResponse {
    pub success: bool,
    pub message: String,
}

/// Update an order's status, notes or tracking info
#[utoipa::path(
    put,
    path = "/api/orders",
    request_body = AdminOrderUpdate,
    responses(
        (status = 200, description = "Order updated", body = OrderUpdateResponse),
        (status = 400, description = "Missing order id", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    Json(update): Json<AdminOrderUpdate>,
) -> Result<Json<OrderUpdateResponse>, ServiceError> {
    state.orders.admin_update(update).await?;
    Ok(Json(OrderUpdateResponse {
        success: true,
        message: "Order updated successfully".to_string(),
    }))
}

pub fn order_routes() -> Router<AppState> {
    Router::new().route("/api/orders", get(list_orders).put(update_order))
}
