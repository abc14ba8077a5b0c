pub mod auth;
pub mod config;
pub mod credentials;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod openapi;
pub mod services;
pub mod webhooks;

use axum::{extract::State, routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::ToSchema;

use crate::auth::IdentityVerifier;
use crate::config::AppConfig;
use crate::credentials::CredentialResolver;
use crate::services::checkout::{CoinbaseCharges, LemonSqueezyCheckouts, StripeCheckout};
use crate::services::orders::{OrderService, OrderStore, SeaOrmOrderStore};
use crate::services::reseller::ResellerClient;
use crate::webhooks::WebhookDispatcher;

/// Shared application state, constructed once at startup and cloned into
/// every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub orders: OrderService,
    pub dispatcher: WebhookDispatcher,
    pub credentials: Arc<CredentialResolver>,
    pub identity: IdentityVerifier,
    pub stripe: StripeCheckout,
    pub coinbase: CoinbaseCharges,
    pub lemonsqueezy: LemonSqueezyCheckouts,
    pub reseller: ResellerClient,
}

impl AppState {
    /// Production wiring: sea-orm order store, credential store backed by
    /// the same database with env-var fallback.
    pub fn new(config: Arc<AppConfig>, db: Arc<DatabaseConnection>) -> Self {
        let store: Arc<dyn OrderStore> = Arc::new(SeaOrmOrderStore::new(db.clone()));
        let credentials = Arc::new(CredentialResolver::with_store(db.clone()));
        Self::with_parts(config, db, store, credentials)
    }

    /// Explicit wiring, used by tests to substitute the store or the
    /// credential chain.
    pub fn with_parts(
        config: Arc<AppConfig>,
        db: Arc<DatabaseConnection>,
        store: Arc<dyn OrderStore>,
        credentials: Arc<CredentialResolver>,
    ) -> Self {
        let http = reqwest::Client::new();
        let identity = IdentityVerifier::new(&config);
        Self {
            orders: OrderService::new(store.clone()),
            dispatcher: WebhookDispatcher::new(store),
            identity,
            stripe: StripeCheckout::new(credentials.clone(), http.clone(), &config),
            coinbase: CoinbaseCharges::new(credentials.clone(), http.clone(), &config),
            lemonsqueezy: LemonSqueezyCheckouts::new(credentials.clone(), http.clone(), &config),
            reseller: ResellerClient::new(credentials.clone(), http, &config),
            credentials,
            config,
            db,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

/// The full application router: API routes, health and status probes,
/// and the Swagger UI.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::checkout::checkout_routes())
        .merge(handlers::webhooks::webhook_routes())
        .merge(handlers::orders::order_routes())
        .merge(handlers::balance::balance_routes())
        .route("/health", get(health_check))
        .route("/api/status", get(api_status))
        .merge(openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let status_data = json!({
        "status": "ok",
        "service": "esim-store-api",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    Json(ApiResponse::success(status_data))
}

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "components": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    Json(ApiResponse::success(health_data))
}
