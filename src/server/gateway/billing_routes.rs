use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use super::identity::caller_id;
use super::GatewayState;
use crate::constants::WEBHOOK_SIGNATURE_HEADER;
use crate::server::billing::{parse_event, verify_signature, BillingTarget};
use crate::server::error::ApiError;
use crate::server::store::unix_ms;
use crate::server::upstream::Vendor;

pub(super) async fn checkout(
    State(st): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let user_id = caller_id(&st, &headers).await?;
    let raw_plan = body
        .get("planType")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let plan = st
        .catalog
        .by_key(raw_plan)
        .ok_or_else(|| ApiError::validation(format!("unknown planType {raw_plan:?}")))?;
    let Some(price_id) = plan.price_id.as_deref() else {
        return Err(ApiError::validation(format!(
            "the {} plan cannot be purchased",
            plan.name
        )));
    };
    let key = st
        .secrets
        .get_vendor_key(Vendor::Billing)
        .ok_or(ApiError::NotConfigured("billing api key"))?;

    let billing = st.cfg.read().vendors.billing.clone();
    let url = st
        .upstream
        .create_checkout_session(
            &billing.base_url,
            &key,
            price_id,
            plan.key.as_str(),
            &user_id,
            &billing.success_url,
            &billing.cancel_url,
            st.request_timeout_seconds(),
        )
        .await?;
    Ok(Json(json!({ "url": url })))
}

pub(super) async fn webhook(
    State(st): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let secret = st
        .secrets
        .get_webhook_secret()
        .ok_or(ApiError::NotConfigured("webhook secret"))?;
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::validation(format!("missing {WEBHOOK_SIGNATURE_HEADER} header")))?;
    let now = unix_ms();
    verify_signature(&secret, signature, &body, now / 1000)?;

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation(format!("webhook body is not JSON: {e}")))?;
    let Some(event) = parse_event(&st.catalog, &payload)? else {
        return Ok(Json(json!({ "received": true })));
    };

    let user_id = match &event.target {
        BillingTarget::User(id) => Some(id.clone()),
        BillingTarget::Customer(customer) => st
            .store
            .find_user_by_customer(customer)?
            .map(|u| u.user_id),
    };
    let Some(user_id) = user_id else {
        log::warn!("billing event {} for unknown customer", event.kind);
        st.store.add_event(
            "billing",
            "warning",
            "billing_unknown_customer",
            &format!("{} names a customer with no user record", event.kind),
            json!({ "target": format!("{:?}", event.target) }),
        );
        return Ok(Json(json!({ "received": true })));
    };

    let record = st.store.update_subscription(&user_id, &event.update, now)?;
    log::info!(
        "billing event {} applied to {user_id}: status={:?} plan={}",
        event.kind,
        record.subscription_status,
        record.plan_type.as_str()
    );
    st.store.add_event(
        "billing",
        "info",
        "subscription_updated",
        &format!("{} applied", event.kind),
        json!({ "userId": user_id, "plan": record.plan_type.as_str() }),
    );
    Ok(Json(json!({ "received": true })))
}
