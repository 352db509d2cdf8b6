use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use super::account::{SubscriptionStatus, SubscriptionUpdate};
use super::error::ApiError;
use super::plans::{PlanCatalog, PlanType};
use crate::constants::WEBHOOK_TOLERANCE_SECONDS;

type HmacSha256 = Hmac<Sha256>;

/// Verify a payment-provider webhook signature header (`t=<unix>,v1=<hex>[,v1=...]`).
///
/// The signed payload is `"{t}.{raw body}"`. Timestamps further than the
/// tolerance from `now_secs` are rejected to block replays.
pub fn verify_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    now_secs: u64,
) -> Result<(), ApiError> {
    let mut timestamp: Option<&str> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => candidates.push(v),
            _ => {}
        }
    }

    let Some(ts_raw) = timestamp else {
        return Err(ApiError::validation("webhook signature missing timestamp"));
    };
    let ts: u64 = ts_raw
        .parse()
        .map_err(|_| ApiError::validation("webhook signature has a bad timestamp"))?;
    if now_secs.abs_diff(ts) > WEBHOOK_TOLERANCE_SECONDS {
        log::warn!("webhook timestamp outside tolerance (t={ts}, now={now_secs})");
        return Err(ApiError::validation("webhook timestamp outside tolerance"));
    }

    for candidate in candidates {
        let Ok(expected) = hex::decode(candidate) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| ApiError::NotConfigured("webhook secret"))?;
        mac.update(ts_raw.as_bytes());
        mac.update(b".");
        mac.update(body);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }
    log::warn!("webhook signature verification failed");
    Err(ApiError::validation("invalid webhook signature"))
}

/// Whose record a billing event updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingTarget {
    User(String),
    /// Only the provider's customer id is known; resolved through the user records.
    Customer(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BillingEvent {
    pub kind: String,
    pub target: BillingTarget,
    pub update: SubscriptionUpdate,
}

fn str_at<'a>(v: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = v;
    for key in path {
        cur = cur.get(*key)?;
    }
    cur.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn target_of(object: &Value, user_path: &[&str]) -> Option<BillingTarget> {
    if let Some(user) = str_at(object, user_path).or_else(|| str_at(object, &["metadata", "userId"]))
    {
        return Some(BillingTarget::User(user.to_string()));
    }
    str_at(object, &["customer"]).map(|c| BillingTarget::Customer(c.to_string()))
}

/// Translate a verified webhook payload into a user-record update.
///
/// Returns `Ok(None)` for event types this service does not act on.
pub fn parse_event(catalog: &PlanCatalog, payload: &Value) -> Result<Option<BillingEvent>, ApiError> {
    let kind = str_at(payload, &["type"])
        .ok_or_else(|| ApiError::validation("webhook event has no type"))?
        .to_string();
    let object = payload
        .get("data")
        .and_then(|d| d.get("object"))
        .ok_or_else(|| ApiError::validation("webhook event has no data.object"))?;

    let customer_id = str_at(object, &["customer"]).map(str::to_string);
    let (target, update) = match kind.as_str() {
        "checkout.session.completed" => {
            let target = target_of(object, &["client_reference_id"]);
            let plan_type = str_at(object, &["metadata", "planType"]).and_then(PlanType::parse);
            let update = SubscriptionUpdate {
                status: Some(SubscriptionStatus::Active),
                plan_type,
                customer_id,
                subscription_id: str_at(object, &["subscription"]).map(str::to_string),
                ..Default::default()
            };
            (target, update)
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            let target = target_of(object, &["metadata", "userId"]);
            let price_id = object
                .get("items")
                .and_then(|i| i.get("data"))
                .and_then(|d| d.as_array())
                .and_then(|items| items.first())
                .and_then(|item| str_at(item, &["price", "id"]));
            let plan = catalog.resolve(str_at(object, &["metadata", "planType"]), price_id);
            let update = SubscriptionUpdate {
                status: str_at(object, &["status"]).map(SubscriptionStatus::parse),
                plan_type: Some(plan.key),
                price_id: price_id.map(str::to_string),
                customer_id,
                subscription_id: str_at(object, &["id"]).map(str::to_string),
            };
            (target, update)
        }
        "customer.subscription.deleted" => {
            let target = target_of(object, &["metadata", "userId"]);
            let update = SubscriptionUpdate {
                status: Some(SubscriptionStatus::Canceled),
                plan_type: Some(PlanType::Free),
                customer_id,
                ..Default::default()
            };
            (target, update)
        }
        other => {
            log::debug!("ignoring billing event {other}");
            return Ok(None);
        }
    };

    let target = target
        .ok_or_else(|| ApiError::validation(format!("{kind} names neither a user nor a customer")))?;
    Ok(Some(BillingEvent {
        kind,
        target,
        update,
    }))
}
