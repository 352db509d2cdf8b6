use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post as post_route;
use axum::{Json, Router};
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use serde_json::{json, Value};
use sha2::Sha256;

use super::common::*;
use crate::server::account::{SubscriptionStatus, SubscriptionUpdate};
use crate::server::plans::PlanType;
use crate::server::store::unix_ms;
use crate::server::upstream::Vendor;

const WEBHOOK_SECRET: &str = "whsec_test";

fn signature_for(secret: &str, ts: u64, body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{ts}.{body}").as_bytes());
    format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
}

fn webhook_request(body: &str, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/billing/webhook")
        .header("content-type", "application/json")
        .header("stripe-signature", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn subscription_updated(user: &str, price: &str) -> String {
    json!({
        "id": "evt_1",
        "type": "customer.subscription.updated",
        "data": { "object": {
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "metadata": { "userId": user },
            "items": { "data": [ { "price": { "id": price } } ] }
        }}
    })
    .to_string()
}

fn billing_app() -> TestApp {
    let t = test_app();
    t.state.secrets.set_webhook_secret(WEBHOOK_SECRET).unwrap();
    t
}

#[tokio::test]
async fn bad_signature_changes_nothing() {
    let t = billing_app();
    t.state.store.seed_trial("u1", unix_ms()).unwrap();
    let before = t.state.store.get_user("u1").unwrap();

    let body = subscription_updated("u1", "price_pro");
    let now = unix_ms() / 1000;
    for sig in [
        signature_for("wrong-secret", now, &body),
        signature_for(WEBHOOK_SECRET, now - 3_600, &body),
        format!("t={now},v1=deadbeef"),
        "garbage".to_string(),
    ] {
        let (status, _, _) = send(&t.app, webhook_request(&body, &sig)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "signature {sig}");
    }

    // Signed over a different body.
    let sig = signature_for(WEBHOOK_SECRET, now, &subscription_updated("u1", "price_team"));
    let (status, _, _) = send(&t.app, webhook_request(&body, &sig)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(t.state.store.get_user("u1").unwrap(), before);
}

#[tokio::test]
async fn subscription_update_activates_plan_from_price_id() {
    let t = billing_app();
    t.state.store.seed_trial("u1", unix_ms()).unwrap();

    let body = subscription_updated("u1", "price_pro");
    let sig = signature_for(WEBHOOK_SECRET, unix_ms() / 1000, &body);
    let (status, _, resp) = send(&t.app, webhook_request(&body, &sig)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp, json!({ "received": true }));

    let user = t.state.store.get_user("u1").unwrap().unwrap();
    assert_eq!(user.subscription_status, Some(SubscriptionStatus::Active));
    assert_eq!(user.plan_type, PlanType::Pro);
    assert_eq!(user.customer_id.as_deref(), Some("cus_1"));
    assert!(user.trial_started_at_unix_ms.is_some());

    let (_, _, trial) = send(&t.app, get_as("/trial", "u1")).await;
    assert_eq!(trial["isSubscribed"], true);
}

#[tokio::test]
async fn customer_only_events_resolve_through_stored_customer() {
    let t = billing_app();
    t.state
        .store
        .update_subscription(
            "u7",
            &SubscriptionUpdate {
                status: Some(SubscriptionStatus::Active),
                plan_type: Some(PlanType::Team),
                customer_id: Some("cus_7".to_string()),
                ..Default::default()
            },
            unix_ms(),
        )
        .unwrap();

    let body = json!({
        "type": "customer.subscription.deleted",
        "data": { "object": { "id": "sub_7", "customer": "cus_7" } }
    })
    .to_string();
    let sig = signature_for(WEBHOOK_SECRET, unix_ms() / 1000, &body);
    let (status, _, _) = send(&t.app, webhook_request(&body, &sig)).await;
    assert_eq!(status, StatusCode::OK);

    let user = t.state.store.get_user("u7").unwrap().unwrap();
    assert_eq!(user.subscription_status, Some(SubscriptionStatus::Canceled));
    assert_eq!(user.plan_type, PlanType::Free);

    // Unknown customers are acknowledged and logged, not retried forever.
    let body = json!({
        "type": "customer.subscription.deleted",
        "data": { "object": { "customer": "cus_ghost" } }
    })
    .to_string();
    let sig = signature_for(WEBHOOK_SECRET, unix_ms() / 1000, &body);
    let (status, _, _) = send(&t.app, webhook_request(&body, &sig)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(t
        .state
        .store
        .list_events(20)
        .iter()
        .any(|e| e.code == "billing_unknown_customer"));
}

#[tokio::test]
async fn unrelated_events_are_acknowledged() {
    let t = billing_app();
    let body = json!({ "type": "invoice.paid", "data": { "object": {} } }).to_string();
    let sig = signature_for(WEBHOOK_SECRET, unix_ms() / 1000, &body);
    let (status, _, resp) = send(&t.app, webhook_request(&body, &sig)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["received"], true);
}

#[tokio::test]
async fn webhook_without_secret_is_refused() {
    let t = test_app();
    let body = subscription_updated("u1", "price_pro");
    let sig = signature_for(WEBHOOK_SECRET, unix_ms() / 1000, &body);
    let (status, _, _) = send(&t.app, webhook_request(&body, &sig)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(t.state.store.get_user("u1").unwrap().is_none());
}

#[tokio::test]
async fn checkout_creates_a_session_for_the_plan_price() {
    let captured: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let captured2 = captured.clone();
    let provider = Router::new().route(
        "/v1/checkout/sessions",
        post_route(move |body: String| {
            *captured2.lock() = Some(body);
            async move { Json(json!({ "id": "cs_1", "url": "https://pay.test/cs_1" })) }
        }),
    );
    let base_url = spawn_mock(provider).await;

    let mut cfg = test_config();
    cfg.vendors.billing.base_url = base_url;
    let t = test_app_with(cfg);
    t.state.secrets.set_vendor_key(Vendor::Billing, "sk_billing").unwrap();

    let (status, _, body) = send(
        &t.app,
        post_json_as("/billing/checkout", "u1", &json!({ "planType": "pro" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://pay.test/cs_1");

    let form = captured.lock().clone().unwrap();
    assert!(form.contains("price_pro"));
    assert!(form.contains("client_reference_id=u1"));
    assert!(form.contains("mode=subscription"));

    let (status, _, _) = send(
        &t.app,
        post_json_as("/billing/checkout", "u1", &json!({ "planType": "free" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, resp): (StatusCode, _, Value) = send(
        &t.app,
        post_json_as("/billing/checkout", "u1", &json!({ "planType": "platinum" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"]["type"], "invalid_request");
}
