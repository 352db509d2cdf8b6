//! Static plan catalog and the entitlement decision built on top of it.

use serde::{Deserialize, Serialize};

use super::account::{SubscriptionStatus, UserRecord};
use super::config::PlansConfig;
use super::trial::TrialPhase;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    #[default]
    Free,
    Pro,
    Team,
    Enterprise,
}

impl PlanType {
    pub const ALL: [PlanType; 4] = [
        PlanType::Free,
        PlanType::Pro,
        PlanType::Team,
        PlanType::Enterprise,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Free => "free",
            PlanType::Pro => "pro",
            PlanType::Team => "team",
            PlanType::Enterprise => "enterprise",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub key: PlanType,
    pub name: String,
    /// `None` is unlimited.
    pub minutes_per_month: Option<u64>,
    pub price_usd_cents: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    pub fn from_config(cfg: &PlansConfig) -> Self {
        let plans = PlanType::ALL
            .into_iter()
            .map(|key| {
                let p = cfg.get(key);
                let price_id = p.price_id.trim();
                Plan {
                    key,
                    name: p.display_name.clone(),
                    minutes_per_month: p.minutes_per_month,
                    price_usd_cents: p.price_usd_cents,
                    price_id: (!price_id.is_empty()).then(|| price_id.to_string()),
                }
            })
            .collect();
        Self { plans }
    }

    pub fn list(&self) -> &[Plan] {
        &self.plans
    }

    pub fn get(&self, key: PlanType) -> &Plan {
        // from_config builds one entry per PlanType, in PlanType::ALL order.
        &self.plans[key as usize]
    }

    pub fn by_key(&self, raw: &str) -> Option<&Plan> {
        PlanType::parse(raw).map(|k| self.get(k))
    }

    /// Reverse lookup of a payment-provider price id. Unknown ids are not an error.
    pub fn plan_by_price_id(&self, price_id: &str) -> Option<&Plan> {
        let price_id = price_id.trim();
        if price_id.is_empty() {
            return None;
        }
        self.plans
            .iter()
            .find(|p| p.price_id.as_deref() == Some(price_id))
    }

    /// Price id wins over the plan key; anything unrecognised resolves to the free plan.
    pub fn resolve(&self, plan_type: Option<&str>, price_id: Option<&str>) -> &Plan {
        if let Some(plan) = price_id.and_then(|id| self.plan_by_price_id(id)) {
            return plan;
        }
        if let Some(plan) = plan_type.and_then(|k| self.by_key(k)) {
            return plan;
        }
        if plan_type.is_some() || price_id.is_some() {
            // Fail open for display: a billing misconfiguration shows up here, not as an error.
            log::warn!(
                "unknown plan (plan_type={:?}, price_id={:?}); falling back to free",
                plan_type,
                price_id
            );
        }
        self.get(PlanType::Free)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementSource {
    Subscription,
    Trial,
    Free,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub plan: PlanType,
    pub plan_name: String,
    pub source: EntitlementSource,
    pub quota_minutes: Option<u64>,
    pub used_minutes: f64,
    pub remaining_minutes: Option<f64>,
    pub allowed: bool,
}

/// Decide the quota that applies to `user` and whether more usage is allowed.
///
/// `used_seconds` is the user's voice time in the current billing month.
pub fn entitlement(
    catalog: &PlanCatalog,
    user: Option<&UserRecord>,
    phase: TrialPhase,
    trial_plan: PlanType,
    used_seconds: u64,
) -> Entitlement {
    let subscribed = user.filter(|u| u.subscription_status == Some(SubscriptionStatus::Active));
    let (plan, source) = if let Some(user) = subscribed {
        let plan = catalog.resolve(Some(user.plan_type.as_str()), user.price_id.as_deref());
        (plan, EntitlementSource::Subscription)
    } else if phase == TrialPhase::Trialing {
        (catalog.get(trial_plan), EntitlementSource::Trial)
    } else {
        (catalog.get(PlanType::Free), EntitlementSource::Free)
    };

    let used_minutes = used_seconds as f64 / 60.0;
    let (remaining_minutes, allowed) = match plan.minutes_per_month {
        Some(quota) => {
            let remaining = (quota as f64 - used_minutes).max(0.0);
            (Some(remaining), used_minutes < quota as f64)
        }
        None => (None, true),
    };

    Entitlement {
        plan: plan.key,
        plan_name: plan.name.clone(),
        source,
        quota_minutes: plan.minutes_per_month,
        used_minutes,
        remaining_minutes,
        allowed,
    }
}
