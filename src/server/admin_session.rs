use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::constants::{ADMIN_SESSION_COOKIE, ADMIN_SESSION_TTL_MS};

type HmacSha256 = Hmac<Sha256>;

// Tokens are `base64url(issued_ms) "." hex(hmac_sha256(key, base64url(issued_ms)))`.
// Nothing is stored server side; rotating the key revokes every session.

fn sign(key: &str, payload: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn issue_token(key: &str, now_ms: u64) -> Option<String> {
    let payload = URL_SAFE_NO_PAD.encode(now_ms.to_string());
    let sig = sign(key, &payload)?;
    Some(format!("{payload}.{sig}"))
}

/// True when `token` was signed with `key` and is younger than the session TTL.
pub fn verify_token(key: &str, token: &str, now_ms: u64) -> bool {
    let Some((payload, sig)) = token.trim().split_once('.') else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        return false;
    };
    mac.update(payload.as_bytes());
    if mac.verify_slice(&sig_bytes).is_err() {
        return false;
    }

    let issued_ms = URL_SAFE_NO_PAD
        .decode(payload)
        .ok()
        .and_then(|b| String::from_utf8(b).ok())
        .and_then(|s| s.parse::<u64>().ok());
    match issued_ms {
        // Tokens from the future are rejected so a skewed clock cannot mint long-lived sessions.
        Some(issued) => issued <= now_ms && now_ms - issued < ADMIN_SESSION_TTL_MS,
        None => false,
    }
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{ADMIN_SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ADMIN_SESSION_TTL_MS / 1000
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_cookie(secure: bool) -> String {
    let mut cookie =
        format!("{ADMIN_SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ADMIN_SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty())
}
