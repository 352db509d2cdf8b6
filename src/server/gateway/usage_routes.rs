use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use super::identity::require_admin;
use super::GatewayState;
use crate::server::error::ApiError;
use crate::server::store::{iso_from_unix_ms, unix_ms};
use crate::server::upstream::Vendor;
use crate::server::usage::{summarize, DateRange, UsageEventInput};

pub(super) async fn record_usage(
    State(st): State<GatewayState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let input = UsageEventInput::from_json(&body)?;
    st.store.record_usage(input)?;
    Ok(Json(json!({ "success": true })))
}

pub(super) async fn usage_summary(
    State(st): State<GatewayState>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&st, &headers)?;
    let range = DateRange::parse(
        q.get("startDate").map(String::as_str),
        q.get("endDate").map(String::as_str),
    )?;
    let events = st.store.list_usage(&range)?;
    let summary = summarize(&events, &range);

    let vendor_account_usage = match st.secrets.get_vendor_key(Vendor::Voice) {
        Some(key) => {
            let base_url = st.cfg.read().vendors.voice.base_url.clone();
            st.upstream
                .voice_account_usage(&base_url, &key, st.request_timeout_seconds())
                .await?
        }
        None => Value::Null,
    };

    Ok(Json(json!({
        "summary": summary,
        "vendorAccountUsage": vendor_account_usage,
        "generatedAt": iso_from_unix_ms(unix_ms()),
    })))
}
