pub const USAGE_TYPE_LLM_TEXT: &str = "llm-text";
pub const USAGE_TYPE_VOICE: &str = "voice";
pub const ADMIN_SESSION_COOKIE: &str = "admin_session";
pub const ADMIN_SESSION_TTL_MS: u64 = 24 * 60 * 60 * 1000;
pub const DEFAULT_TRIAL_DAYS: u64 = 7;
pub const DAY_MS: u64 = 24 * 60 * 60 * 1000;
pub const USER_ID_HEADER: &str = "x-user-id";
pub const WEBHOOK_SIGNATURE_HEADER: &str = "stripe-signature";
pub const WEBHOOK_TOLERANCE_SECONDS: u64 = 300;
pub const DATA_DIR_ENV: &str = "ROLEPLAY_DATA_DIR";
