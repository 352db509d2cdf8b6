use axum::http::{header, HeaderMap};

use super::GatewayState;
use crate::constants::USER_ID_HEADER;
use crate::server::admin_session;
use crate::server::error::ApiError;
use crate::server::store::unix_ms;

fn bearer_token(auth: &str) -> Option<&str> {
    let s = auth.trim();
    let prefix = "Bearer ";
    let head = s.get(..prefix.len())?;
    if s.len() > prefix.len() && head.eq_ignore_ascii_case(prefix) {
        return s.get(prefix.len()..).map(str::trim);
    }
    None
}

/// Who is calling. Verified with the identity provider when one is configured,
/// otherwise taken from the header set by the trusted edge.
pub(super) async fn caller_id(st: &GatewayState, headers: &HeaderMap) -> Result<String, ApiError> {
    let verify_url = st.cfg.read().identity.verify_url.trim().to_string();
    if !verify_url.is_empty() {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::auth("missing bearer session token"))?;
        return st
            .upstream
            .verify_identity(&verify_url, token, st.request_timeout_seconds())
            .await;
    }

    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::auth(format!("missing {USER_ID_HEADER} header")))
}

pub(super) fn require_admin(st: &GatewayState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(key) = st.secrets.get_session_key() else {
        return Err(ApiError::auth("admin sessions are not available"));
    };
    let Some(token) = admin_session::token_from_headers(headers) else {
        return Err(ApiError::auth("admin session required"));
    };
    if !admin_session::verify_token(&key, &token, unix_ms()) {
        return Err(ApiError::auth("admin session invalid or expired"));
    }
    Ok(())
}
