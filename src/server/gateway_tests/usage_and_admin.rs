use axum::http::{header, StatusCode};
use serde_json::json;

use super::common::*;
use crate::constants::ADMIN_SESSION_TTL_MS;
use crate::server::usage::DateRange;

#[tokio::test]
async fn health_works_without_vendors() {
    let t = test_app();
    let (status, _, body) = send(&t.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));
}

#[tokio::test]
async fn post_usage_requires_user_and_type() {
    let t = test_app();
    for body in [
        json!({ "type": "llm-text" }),
        json!({ "userId": "u1" }),
        json!({ "userId": "u1", "type": "video" }),
        json!({ "userId": "u1", "type": "llm-text", "inputTokens": -3 }),
        json!({ "userId": "u1", "type": "voice", "durationSeconds": "long" }),
    ] {
        let (status, _, resp) = send(&t.app, post_json("/usage", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(resp["error"]["type"], "invalid_request");
    }
    assert!(t
        .state
        .store
        .list_usage(&DateRange::default())
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn summary_sums_text_tokens_and_counts_zeroed_events() {
    let t = test_app();
    for body in [
        json!({ "userId": "u1", "type": "llm-text", "inputTokens": 100, "outputTokens": 50, "scenarioId": "s1", "scenarioTitle": "Angry customer" }),
        json!({ "userId": "u2", "type": "llm-text", "inputTokens": 30, "outputTokens": 10 }),
        json!({ "userId": "u3", "type": "voice" }),
    ] {
        let (status, _, resp) = send(&t.app, post_json("/usage", &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp, json!({ "success": true }));
    }

    let cookie = admin_cookie(&t.app).await;
    let (status, _, body) = send(&t.app, with_cookie(get("/usage"), &cookie)).await;
    assert_eq!(status, StatusCode::OK);

    let summary = &body["summary"];
    assert_eq!(summary["totalEvents"], 3);
    assert_eq!(summary["llmText"]["inputTokens"], 130);
    assert_eq!(summary["llmText"]["outputTokens"], 60);
    assert_eq!(summary["voice"]["events"], 1);
    assert_eq!(summary["voice"]["durationSeconds"], 0);
    assert_eq!(summary["byUser"]["u3"]["events"], 1);
    assert_eq!(summary["byScenario"]["s1"]["title"], "Angry customer");
    assert_eq!(summary["byScenario"]["unassigned"]["events"], 2);
    assert!(body["vendorAccountUsage"].is_null());
    assert!(body["generatedAt"].as_str().is_some());
}

#[tokio::test]
async fn summary_validates_date_range() {
    let t = test_app();
    let cookie = admin_cookie(&t.app).await;

    let (status, _, _) = send(
        &t.app,
        with_cookie(get("/usage?startDate=2025-02-01&endDate=2025-01-01"), &cookie),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&t.app, with_cookie(get("/usage?startDate=yesterday"), &cookie)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(
        &t.app,
        with_cookie(get("/usage?startDate=2025-01-01&endDate=2025-01-31"), &cookie),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["startDate"], "2025-01-01T00:00:00.000Z");
    assert_eq!(body["summary"]["endDate"], "2025-01-31T23:59:59.999Z");
}

#[tokio::test]
async fn summary_rejects_missing_tampered_and_expired_sessions() {
    let t = test_app();

    let (status, _, body) = send(&t.app, get("/usage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["type"], "unauthorized");

    // The unsigned legacy shape must not pass.
    let legacy = format!("admin_session={}", crate::server::store::unix_ms());
    let (status, _, _) = send(&t.app, with_cookie(get("/usage"), &legacy)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let good = admin_cookie(&t.app).await;
    let mut tampered = good.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == '0' { '1' } else { '0' });
    let (status, _, _) = send(&t.app, with_cookie(get("/usage"), &tampered)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let expired = aged_admin_cookie(&t.state, ADMIN_SESSION_TTL_MS + 1_000);
    let (status, _, _) = send(&t.app, with_cookie(get("/usage"), &expired)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let fresh = aged_admin_cookie(&t.state, 60_000);
    let (status, _, _) = send(&t.app, with_cookie(get("/usage"), &fresh)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn rotating_the_session_key_logs_admins_out() {
    let t = test_app();
    let cookie = admin_cookie(&t.app).await;
    t.state.secrets.rotate_session_key().unwrap();
    let (status, _, _) = send(&t.app, with_cookie(get("/usage"), &cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_session_and_logout() {
    let t = test_app();

    let (status, headers, _) = send(
        &t.app,
        post_json("/admin/login", &json!({ "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.get(header::SET_COOKIE).is_none());

    let (_, _, body) = send(&t.app, get("/admin/session")).await;
    assert_eq!(body["authenticated"], false);

    let cookie = admin_cookie(&t.app).await;
    let (_, _, body) = send(&t.app, with_cookie(get("/admin/session"), &cookie)).await;
    assert_eq!(body["authenticated"], true);

    let (status, headers, _) = send(&t.app, post_json("/admin/logout", &json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let cleared = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(cleared.starts_with("admin_session=;"));
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn secure_cookie_flag_follows_config() {
    let mut cfg = test_config();
    cfg.admin.secure_cookie = true;
    let t = test_app_with(cfg);
    let (_, headers, _) = send(
        &t.app,
        post_json("/admin/login", &json!({ "password": ADMIN_PASSWORD })),
    )
    .await;
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.ends_with("; Secure"));
}

#[tokio::test]
async fn admin_events_lists_failed_logins() {
    let t = test_app();
    let _ = send(
        &t.app,
        post_json("/admin/login", &json!({ "password": "nope" })),
    )
    .await;

    let (status, _, _) = send(&t.app, get("/admin/events")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cookie = admin_cookie(&t.app).await;
    let (status, _, body) = send(&t.app, with_cookie(get("/admin/events?limit=10"), &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    let events = body["events"].as_array().unwrap();
    let failed = events
        .iter()
        .find(|e| e["code"] == "admin_login_failed")
        .unwrap();
    assert_eq!(failed["source"], "admin");
    assert!(failed["unixMs"].as_u64().is_some());
}
