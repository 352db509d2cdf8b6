use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::time_and_keys::unix_ms;
use super::Store;

const EVENT_PREFIX: &[u8] = b"event:";

/// One entry of the operational log shown on the admin page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpsEvent {
    pub source: String,
    pub level: String,
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub fields: Value,
    pub unix_ms: u64,
}

impl Store {
    /// Drop everything but the newest MAX_EVENTS entries.
    pub(super) fn prune_events_db(db: &sled::Db) {
        // `event:{unix_ms:013}:{uuid}` keys sort by time, so the tail of a reverse scan is the oldest.
        let stale: Vec<sled::IVec> = db
            .scan_prefix(EVENT_PREFIX)
            .keys()
            .rev()
            .skip(Self::MAX_EVENTS)
            .filter_map(|k| k.ok())
            .collect();
        for key in stale {
            if let Err(e) = db.remove(&key) {
                log::warn!("ops event prune stopped: {e}");
                return;
            }
        }
    }

    /// Best-effort operational log. Never fails the caller.
    pub fn add_event(&self, source: &str, level: &str, code: &str, message: &str, fields: Value) {
        let event = OpsEvent {
            source: source.to_string(),
            level: level.to_string(),
            code: code.to_string(),
            message: message.to_string(),
            fields,
            unix_ms: unix_ms(),
        };
        let key = format!("event:{:013}:{}", event.unix_ms, uuid::Uuid::new_v4());
        if let Err(e) = self.db.insert(key.as_bytes(), Self::encode(&event)) {
            log::warn!("ops event {code} not stored: {e}");
            return;
        }
        Self::prune_events_db(&self.db);
        if let Err(e) = self.db.flush() {
            log::warn!("ops event {code} not flushed: {e}");
        }
    }

    /// Newest first. Entries that no longer decode are skipped.
    pub fn list_events(&self, limit: usize) -> Vec<OpsEvent> {
        self.db
            .scan_prefix(EVENT_PREFIX)
            .values()
            .rev()
            .filter_map(|v| v.ok())
            .filter_map(|v| Self::decode::<OpsEvent>(&v))
            .take(limit)
            .collect()
    }
}
