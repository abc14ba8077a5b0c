#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tower::ServiceExt;

use esim_store_api::config::AppConfig;
use esim_store_api::credentials::{CredentialKey, CredentialResolver, Provider, StaticSource};
use esim_store_api::entities::order;
use esim_store_api::services::orders::{InMemoryOrderStore, OrderStore};
use esim_store_api::{app_router, AppState};

pub const JWT_SECRET: &str =
    "integration-test-secret-integration-test-secret-integration-0000";
pub const LS_WEBHOOK_SECRET: &str = "whsec_lemonsqueezy_test";
pub const STRIPE_WEBHOOK_SECRET: &str = "whsec_stripe_test";
pub const COINBASE_WEBHOOK_SECRET: &str = "whsec_coinbase_test";

/// Application harness: in-memory order store, static credential chain,
/// no live database behind the state.
pub struct TestApp {
    router: Router,
    pub store: Arc<InMemoryOrderStore>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt_secret: JWT_SECRET.into(),
        auth_issuer: None,
        auth_audience: None,
        host: "127.0.0.1".into(),
        port: 18080,
        environment: "test".into(),
        log_level: "info".into(),
        log_json: false,
        stripe_mode: "live".into(),
        app_url: "https://store.example.com".into(),
        webhook_tolerance_secs: 300,
        stripe_api_url: "https://api.stripe.com".into(),
        coinbase_api_url: "https://api.commerce.coinbase.com".into(),
        lemonsqueezy_api_url: "https://api.lemonsqueezy.com".into(),
        reseller_api_url: "https://partners-api.airalo.com".into(),
        reseller_timeout_secs: 30,
        minimum_balance: 4.0,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        db_max_connections: 1,
        db_connect_timeout_secs: 5,
    }
}

impl TestApp {
    /// App with every webhook secret configured.
    pub fn new() -> Self {
        let source = StaticSource::new()
            .with(
                Provider::LemonSqueezy,
                CredentialKey::WebhookSecret,
                LS_WEBHOOK_SECRET,
            )
            .with(
                Provider::Stripe,
                CredentialKey::WebhookSecret,
                STRIPE_WEBHOOK_SECRET,
            )
            .with(
                Provider::Coinbase,
                CredentialKey::WebhookSecret,
                COINBASE_WEBHOOK_SECRET,
            );
        Self::with_resolver(CredentialResolver::new(vec![Arc::new(source)]))
    }

    /// App with an empty credential chain, for configuration-fault tests.
    pub fn without_credentials() -> Self {
        Self::with_resolver(CredentialResolver::new(vec![Arc::new(
            StaticSource::new(),
        )]))
    }

    fn with_resolver(resolver: CredentialResolver) -> Self {
        let store = Arc::new(InMemoryOrderStore::new());
        let state = AppState::with_parts(
            Arc::new(test_config()),
            Arc::new(DatabaseConnection::default()),
            store.clone() as Arc<dyn OrderStore>,
            Arc::new(resolver),
        );
        Self {
            router: app_router(state),
            store,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Vec<u8>>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    pub async fn seed(&self, model: order::Model) {
        self.store.seed(model).await;
    }

    pub async fn order(&self, id: &str) -> Option<order::Model> {
        self.store.get(id).await.expect("store lookup")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Method::GET, uri, &[], None).await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> Response {
        self.request(
            Method::PUT,
            uri,
            &[("content-type", "application/json")],
            Some(body.to_string().into_bytes()),
        )
        .await
    }
}

/// Order row with the given id and email, created `age_secs` seconds ago.
pub fn seeded_order(id: &str, email: &str, age_secs: i64) -> order::Model {
    let created_at = Utc::now() - Duration::seconds(age_secs);
    order::Model {
        id: id.to_string(),
        email: Some(email.to_string()),
        plan_id: Some("plan-test".to_string()),
        plan_name: Some("Test Plan".to_string()),
        amount: None,
        currency: Some("USD".to_string()),
        payment_method: None,
        payment_status: Some("pending".to_string()),
        status: Some("pending".to_string()),
        processing_status: None,
        iccid: None,
        reseller_order_id: None,
        provider_order_id: None,
        provider_payload: None,
        notes: None,
        tracking_info: None,
        created_at,
        updated_at: None,
        payment_created_at: None,
        payment_confirmed_at: None,
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
