//! End-to-end webhook receiver tests: signature verification, order
//! projection updates, idempotent replays and configuration faults.

mod common;

use axum::http::Method;
use common::{response_json, TestApp, COINBASE_WEBHOOK_SECRET, LS_WEBHOOK_SECRET};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

fn sign_hex(payload: &[u8], secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn ls_event(event_name: &str, order_id: Option<&str>) -> Value {
    let mut custom = json!({"plan_id": "plan-test"});
    if let Some(id) = order_id {
        custom["order_id"] = json!(id);
    }
    json!({
        "meta": {"event_name": event_name},
        "data": {
            "id": "987654",
            "attributes": {"custom": custom}
        }
    })
}

async fn deliver_ls(app: &TestApp, payload: &Value, secret: &str) -> axum::response::Response {
    let body = payload.to_string().into_bytes();
    let signature = sign_hex(&body, secret);
    app.request(
        Method::POST,
        "/api/webhooks/lemonsqueezy",
        &[
            ("content-type", "application/json"),
            ("x-signature", &signature),
        ],
        Some(body),
    )
    .await
}

#[tokio::test]
async fn order_created_delivery_creates_a_pending_order() {
    let app = TestApp::new();
    let response = deliver_ls(&app, &ls_event("order_created", Some("ord-100")), LS_WEBHOOK_SECRET).await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["success"], true);
    assert_eq!(body["result"]["orderId"], "ord-100");

    let order = app.order("ord-100").await.unwrap();
    assert_eq!(order.payment_status.as_deref(), Some("pending"));
    assert_eq!(order.payment_method.as_deref(), Some("lemonsqueezy"));
    assert_eq!(order.provider_order_id.as_deref(), Some("987654"));
}

#[tokio::test]
async fn bad_signature_is_rejected_and_nothing_is_written() {
    let app = TestApp::new();
    let response = deliver_ls(&app, &ls_event("order_created", Some("ord-101")), "wrong-secret").await;
    assert_eq!(response.status(), 401);

    let body = response_json(response).await;
    assert_eq!(body["success"], false);

    assert!(app.order("ord-101").await.is_none());
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let app = TestApp::new();
    let payload = ls_event("order_created", Some("ord-102"));
    let response = app
        .request(
            Method::POST,
            "/api/webhooks/lemonsqueezy",
            &[("content-type", "application/json")],
            Some(payload.to_string().into_bytes()),
        )
        .await;
    assert_eq!(response.status(), 401);
    assert!(app.order("ord-102").await.is_none());
}

#[tokio::test]
async fn missing_webhook_secret_is_a_configuration_fault() {
    let app = TestApp::without_credentials();
    let response = deliver_ls(&app, &ls_event("order_created", Some("ord-103")), LS_WEBHOOK_SECRET).await;
    assert_eq!(response.status(), 500);
    assert!(app.order("ord-103").await.is_none());
}

#[tokio::test]
async fn payment_for_unknown_order_acknowledges_with_failure_result() {
    let app = TestApp::new();
    let response = deliver_ls(&app, &ls_event("order_paid", Some("ghost")), LS_WEBHOOK_SECRET).await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["success"], false);
    assert_eq!(body["result"]["error"], "Order not found");
}

#[tokio::test]
async fn payment_confirmation_flags_provisioning_and_replays_cleanly() {
    let app = TestApp::new();
    app.seed(common::seeded_order("ord-104", "c@example.com", 60)).await;

    let first = deliver_ls(&app, &ls_event("order_paid", Some("ord-104")), LS_WEBHOOK_SECRET).await;
    assert_eq!(first.status(), 200);
    let body = response_json(first).await;
    assert_eq!(body["result"]["success"], true);
    assert_eq!(body["result"]["needsProcessing"], true);

    // Replay of the same delivery is acknowledged and leaves the order
    // confirmed.
    let second = deliver_ls(&app, &ls_event("order_paid", Some("ord-104")), LS_WEBHOOK_SECRET).await;
    assert_eq!(second.status(), 200);
    let body = response_json(second).await;
    assert_eq!(body["result"]["success"], true);

    let order = app.order("ord-104").await.unwrap();
    assert_eq!(order.payment_status.as_deref(), Some("confirmed"));
    assert_eq!(order.email.as_deref(), Some("c@example.com"));
    assert!(order.payment_confirmed_at.is_some());
}

#[tokio::test]
async fn unhandled_event_names_are_acknowledged_without_processing() {
    let app = TestApp::new();
    let response = deliver_ls(&app, &ls_event("license_key_created", None), LS_WEBHOOK_SECRET).await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Event received but not processed");
}

#[tokio::test]
async fn get_on_a_webhook_path_is_method_not_allowed() {
    let app = TestApp::new();
    let response = app.get("/api/webhooks/lemonsqueezy").await;
    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn coinbase_confirmation_confirms_the_order() {
    let app = TestApp::new();
    app.seed(common::seeded_order("ord-105", "c@example.com", 60)).await;

    let payload = json!({
        "event": {
            "type": "charge:confirmed",
            "data": {
                "id": "uuid-1",
                "code": "CHARGECODE",
                "metadata": {"order_id": "ord-105"}
            }
        }
    });
    let body = payload.to_string().into_bytes();
    let signature = sign_hex(&body, COINBASE_WEBHOOK_SECRET);
    let response = app
        .request(
            Method::POST,
            "/api/webhooks/coinbase",
            &[
                ("content-type", "application/json"),
                ("x-cc-webhook-signature", &signature),
            ],
            Some(body),
        )
        .await;
    assert_eq!(response.status(), 200);

    let order = app.order("ord-105").await.unwrap();
    assert_eq!(order.payment_status.as_deref(), Some("confirmed"));
    assert_eq!(order.payment_method.as_deref(), Some("coinbase"));
    assert_eq!(order.provider_order_id.as_deref(), Some("CHARGECODE"));
}

#[tokio::test]
async fn stripe_checkout_completed_confirms_the_order() {
    let app = TestApp::new();
    app.seed(common::seeded_order("ord-106", "c@example.com", 60)).await;

    let payload = json!({
        "type": "checkout.session.completed",
        "data": {"object": {"id": "cs_live_1", "metadata": {"order_id": "ord-106"}}}
    });
    let body = payload.to_string().into_bytes();

    let ts = chrono::Utc::now().timestamp().to_string();
    let mut mac = Hmac::<Sha256>::new_from_slice(common::STRIPE_WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(ts.as_bytes());
    mac.update(b".");
    mac.update(&body);
    let header = format!("t={},v1={}", ts, hex::encode(mac.finalize().into_bytes()));

    let response = app
        .request(
            Method::POST,
            "/api/webhooks/stripe",
            &[
                ("content-type", "application/json"),
                ("stripe-signature", &header),
            ],
            Some(body),
        )
        .await;
    assert_eq!(response.status(), 200);

    let order = app.order("ord-106").await.unwrap();
    assert_eq!(order.payment_status.as_deref(), Some("confirmed"));
    assert_eq!(order.payment_method.as_deref(), Some("stripe"));
    assert_eq!(order.provider_order_id.as_deref(), Some("cs_live_1"));
}

#[tokio::test]
async fn invalid_json_with_a_valid_signature_is_a_bad_request() {
    let app = TestApp::new();
    let body = b"not-json".to_vec();
    let signature = sign_hex(&body, LS_WEBHOOK_SECRET);
    let response = app
        .request(
            Method::POST,
            "/api/webhooks/lemonsqueezy",
            &[("x-signature", &signature)],
            Some(body),
        )
        .await;
    assert_eq!(response.status(), 400);
}
