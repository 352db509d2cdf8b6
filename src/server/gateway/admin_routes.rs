use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::identity::require_admin;
use super::GatewayState;
use crate::server::admin_session::{clear_cookie, issue_token, session_cookie};
use crate::server::error::ApiError;
use crate::server::store::unix_ms;

const DEFAULT_EVENTS_LIMIT: usize = 50;
const MAX_EVENTS_LIMIT: usize = 200;

/// Constant-time compare over SHA-256 digests of both sides.
fn password_matches(given: &str, expected: &str) -> bool {
    let given = Sha256::digest(given.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    given.as_slice().ct_eq(expected.as_slice()).into()
}

pub(super) async fn login(
    State(st): State<GatewayState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let expected = st
        .secrets
        .get_admin_password()
        .ok_or(ApiError::NotConfigured("admin password"))?;
    let given = body
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if !password_matches(given, &expected) {
        log::warn!("admin login rejected");
        st.store.add_event(
            "admin",
            "warning",
            "admin_login_failed",
            "admin login rejected",
            Value::Null,
        );
        return Err(ApiError::auth("invalid password"));
    }

    let key = st.secrets.ensure_session_key().map_err(|e| {
        log::error!("session key unavailable: {e}");
        ApiError::NotConfigured("session signing key")
    })?;
    let token = issue_token(&key, unix_ms()).ok_or(ApiError::NotConfigured("session signing key"))?;
    let secure = st.cfg.read().admin.secure_cookie;
    log::info!("admin session issued");
    Ok((
        [(header::SET_COOKIE, session_cookie(&token, secure))],
        Json(json!({ "success": true })),
    )
        .into_response())
}

pub(super) async fn logout(State(st): State<GatewayState>) -> Response {
    let secure = st.cfg.read().admin.secure_cookie;
    (
        [(header::SET_COOKIE, clear_cookie(secure))],
        Json(json!({ "success": true })),
    )
        .into_response()
}

pub(super) async fn session(State(st): State<GatewayState>, headers: HeaderMap) -> Json<Value> {
    let authenticated = require_admin(&st, &headers).is_ok();
    Json(json!({ "authenticated": authenticated }))
}

pub(super) async fn events(
    State(st): State<GatewayState>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&st, &headers)?;
    let limit = q
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_EVENTS_LIMIT)
        .clamp(1, MAX_EVENTS_LIMIT);
    Ok(Json(json!({ "events": st.store.list_events(limit) })))
}
