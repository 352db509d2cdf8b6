use serde::{Deserialize, Serialize};

use super::plans::PlanType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialConfig {
    pub days: u64,
    /// Plan whose quota applies while a user is inside the trial window.
    pub plan: PlanType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    pub display_name: String,
    /// Absent means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_per_month: Option<u64>,
    pub price_usd_cents: u64,
    /// Payment-provider price identifier. Empty means the plan cannot be bought.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub price_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlansConfig {
    pub free: PlanConfig,
    pub pro: PlanConfig,
    pub team: PlanConfig,
    pub enterprise: PlanConfig,
}

impl PlansConfig {
    pub fn get(&self, plan: PlanType) -> &PlanConfig {
        match plan {
            PlanType::Free => &self.free,
            PlanType::Pro => &self.pro,
            PlanType::Team => &self.team,
            PlanType::Enterprise => &self.enterprise,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatVendorConfig {
    pub base_url: String,
    pub default_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceVendorConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingVendorConfig {
    pub base_url: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorsConfig {
    pub chat: ChatVendorConfig,
    pub voice: VoiceVendorConfig,
    pub billing: BillingVendorConfig,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Identity-provider endpoint that turns a bearer session token into a user id.
    ///
    /// Empty trusts the `x-user-id` header set by the edge in front of this service.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub verify_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Adds `Secure` to the admin session cookie. Leave off for plain-http local setups.
    #[serde(default)]
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub listen: ListenConfig,
    pub trial: TrialConfig,
    pub plans: PlansConfig,
    pub vendors: VendorsConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

impl AppConfig {
    pub fn default_config() -> Self {
        let plan = |name: &str, minutes: Option<u64>, cents: u64| PlanConfig {
            display_name: name.to_string(),
            minutes_per_month: minutes,
            price_usd_cents: cents,
            price_id: String::new(),
        };

        Self {
            listen: ListenConfig {
                host: "127.0.0.1".to_string(),
                port: 4100,
            },
            trial: TrialConfig {
                days: crate::constants::DEFAULT_TRIAL_DAYS,
                plan: PlanType::Pro,
            },
            plans: PlansConfig {
                free: plan("Free", Some(10), 0),
                pro: plan("Pro", Some(120), 2_900),
                team: plan("Team", Some(600), 9_900),
                enterprise: plan("Enterprise", None, 49_900),
            },
            vendors: VendorsConfig {
                chat: ChatVendorConfig {
                    base_url: "https://api.openai.com".to_string(),
                    default_model: "gpt-4o-mini".to_string(),
                    max_tokens: Some(1_024),
                },
                voice: VoiceVendorConfig {
                    base_url: "https://api.elevenlabs.io".to_string(),
                },
                billing: BillingVendorConfig {
                    base_url: "https://api.stripe.com".to_string(),
                    success_url: "http://localhost:3000/billing/success".to_string(),
                    cancel_url: "http://localhost:3000/pricing".to_string(),
                },
                request_timeout_seconds: 60,
            },
            identity: IdentityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}
