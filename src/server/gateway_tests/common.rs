use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use crate::server::admin_session::issue_token;
use crate::server::config::AppConfig;
use crate::server::gateway::{build_router, open_store_dir, GatewayState};
use crate::server::secrets::SecretStore;
use crate::server::store::unix_ms;

pub(super) const ADMIN_PASSWORD: &str = "correct horse";

pub(super) struct TestApp {
    // Keeps the store and secrets directory alive for the test's duration.
    pub _tmp: tempfile::TempDir,
    pub state: GatewayState,
    pub app: Router,
}

pub(super) fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default_config();
    cfg.listen.port = 0;
    cfg.vendors.request_timeout_seconds = 5;
    cfg.plans.pro.price_id = "price_pro".to_string();
    cfg.plans.team.price_id = "price_team".to_string();
    cfg
}

pub(super) fn test_app_with(cfg: AppConfig) -> TestApp {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = open_store_dir(tmp.path().join("data")).expect("store");
    let secrets = SecretStore::new(tmp.path().join("secrets.json"));
    secrets.set_admin_password(ADMIN_PASSWORD).expect("admin password");
    secrets.ensure_session_key().expect("session key");
    let state = GatewayState::new(cfg, store, secrets);
    let app = build_router(state.clone());
    TestApp {
        _tmp: tmp,
        state,
        app,
    }
}

pub(super) fn test_app() -> TestApp {
    test_app_with(test_config())
}

pub(super) fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub(super) fn get_as(uri: &str, user_id: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", user_id)
        .body(Body::empty())
        .unwrap()
}

pub(super) fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub(super) fn post_json_as(uri: &str, user_id: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-user-id", user_id)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub(super) fn with_cookie(mut req: Request<Body>, cookie: &str) -> Request<Body> {
    req.headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    req
}

pub(super) async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

/// Logs in through the API and returns the `name=value` pair to send back.
pub(super) async fn admin_cookie(app: &Router) -> String {
    let (status, headers, _) = send(
        app,
        post_json(
            "/admin/login",
            &serde_json::json!({ "password": ADMIN_PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    set_cookie.split(';').next().unwrap().to_string()
}

/// A correctly signed token issued `age_ms` ago.
pub(super) fn aged_admin_cookie(state: &GatewayState, age_ms: u64) -> String {
    let key = state.secrets.get_session_key().unwrap();
    let token = issue_token(&key, unix_ms() - age_ms).unwrap();
    format!("admin_session={token}")
}

/// Serve `app` on an ephemeral localhost port and return its base URL.
pub(super) async fn spawn_mock(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}:{}", addr.ip(), addr.port())
}
