use serde::{Deserialize, Serialize};

use super::plans::PlanType;

/// Subscription states as reported by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Paused,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    pub fn parse(raw: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(raw.trim().to_ascii_lowercase()))
            .unwrap_or(SubscriptionStatus::Unknown)
    }
}

/// Per-user account document. Seeded by the trial tracker, updated by billing webhooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_started_at_unix_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_status: Option<SubscriptionStatus>,
    #[serde(default)]
    pub plan_type: PlanType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub updated_at_unix_ms: u64,
}

impl UserRecord {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            trial_started_at_unix_ms: None,
            subscription_status: None,
            plan_type: PlanType::Free,
            price_id: None,
            customer_id: None,
            subscription_id: None,
            updated_at_unix_ms: 0,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription_status == Some(SubscriptionStatus::Active)
    }
}

/// Fields a billing event may change on a user record. `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionUpdate {
    pub status: Option<SubscriptionStatus>,
    pub plan_type: Option<PlanType>,
    pub price_id: Option<String>,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

impl SubscriptionUpdate {
    pub fn apply(&self, record: &mut UserRecord, now_ms: u64) {
        if let Some(status) = &self.status {
            record.subscription_status = Some(status.clone());
        }
        if let Some(plan) = self.plan_type {
            record.plan_type = plan;
        }
        if let Some(price_id) = &self.price_id {
            record.price_id = Some(price_id.clone());
        }
        if let Some(customer_id) = &self.customer_id {
            record.customer_id = Some(customer_id.clone());
        }
        if let Some(subscription_id) = &self.subscription_id {
            record.subscription_id = Some(subscription_id.clone());
        }
        record.updated_at_unix_ms = now_ms;
    }
}
