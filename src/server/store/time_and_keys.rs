use chrono::{SecondsFormat, TimeZone, Utc};

use super::Store;

pub fn unix_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// RFC 3339 rendering used for every timestamp that leaves the service.
pub fn iso_from_unix_ms(ts_unix_ms: u64) -> String {
    match Utc.timestamp_millis_opt(ts_unix_ms as i64).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => "1970-01-01T00:00:00.000Z".to_string(),
    }
}

pub(super) fn is_allowed_key(key: &[u8]) -> bool {
    Store::allowed_key_prefixes()
        .iter()
        .any(|p| key.starts_with(p))
}

/// Path-safe key component: `:` and friends are percent-encoded so composite keys stay unambiguous.
pub(super) fn key_part(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}
