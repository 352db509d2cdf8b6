use super::time_and_keys::unix_ms;
use super::Store;
use crate::server::usage::{DateRange, UsageEvent, UsageEventInput};

// `usage:{created_at:013}:{uuid}`; 13-digit millis keep key order == time order until 2286.
const USAGE_PREFIX: &str = "usage:";
const MAX_TS: u64 = 9_999_999_999_999;

impl Store {
    pub fn record_usage(&self, input: UsageEventInput) -> Result<UsageEvent, sled::Error> {
        self.record_usage_at(input, unix_ms())
    }

    /// Append one event. No idempotency key: calling twice writes two events.
    pub fn record_usage_at(
        &self,
        input: UsageEventInput,
        now_ms: u64,
    ) -> Result<UsageEvent, sled::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let key = format!("{USAGE_PREFIX}{now_ms:013}:{id}");
        let event = input.into_event(id, now_ms);
        self.db.insert(key.as_bytes(), Self::encode(&event))?;
        self.db.flush()?;
        Ok(event)
    }

    /// Events whose creation time falls inside `range`, oldest first.
    pub fn list_usage(&self, range: &DateRange) -> Result<Vec<UsageEvent>, sled::Error> {
        let lower = format!("{USAGE_PREFIX}{:013}", range.start_ms.unwrap_or(0));
        // `;` sorts right after `:`, so this bound includes every key stamped `end`.
        let upper = format!(
            "{USAGE_PREFIX}{:013};",
            range.end_ms.unwrap_or(MAX_TS).min(MAX_TS)
        );

        let mut out = Vec::new();
        for res in self.db.range(lower.into_bytes()..upper.into_bytes()) {
            let (_, v) = res?;
            if let Some(event) = Self::decode::<UsageEvent>(&v) {
                out.push(event);
            }
        }
        Ok(out)
    }

    pub fn list_user_usage(
        &self,
        user_id: &str,
        range: &DateRange,
    ) -> Result<Vec<UsageEvent>, sled::Error> {
        let mut events = self.list_usage(range)?;
        events.retain(|e| e.user_id == user_id);
        Ok(events)
    }
}
