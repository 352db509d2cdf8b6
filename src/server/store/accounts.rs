use super::time_and_keys::key_part;
use super::Store;
use crate::server::account::{SubscriptionStatus, SubscriptionUpdate, UserRecord};

impl Store {
    fn user_key(user_id: &str) -> String {
        format!("user:{}", key_part(user_id))
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, sled::Error> {
        Ok(self
            .db
            .get(Self::user_key(user_id).as_bytes())?
            .and_then(|v| Self::decode::<UserRecord>(&v)))
    }

    /// Start the trial unless one was already started or the user is subscribed.
    ///
    /// Compare-and-swap keeps concurrent first reads from restarting the window.
    pub fn seed_trial(&self, user_id: &str, now_ms: u64) -> Result<UserRecord, sled::Error> {
        let key = Self::user_key(user_id);
        loop {
            let current = self.db.get(key.as_bytes())?;
            let existing = current.as_ref().and_then(|v| Self::decode::<UserRecord>(v));
            if let Some(u) = &existing {
                if u.is_subscribed() || u.trial_started_at_unix_ms.is_some() {
                    return Ok(u.clone());
                }
            }

            let mut next = existing.unwrap_or_else(|| UserRecord::new(user_id));
            next.trial_started_at_unix_ms = Some(now_ms);
            next.subscription_status = Some(SubscriptionStatus::Trialing);
            next.updated_at_unix_ms = now_ms;

            let swapped = self.db.compare_and_swap(
                key.as_bytes(),
                current.as_ref().map(|v| v.as_ref()),
                Some(Self::encode(&next)),
            )?;
            if swapped.is_ok() {
                self.db.flush()?;
                return Ok(next);
            }
        }
    }

    pub fn update_subscription(
        &self,
        user_id: &str,
        update: &SubscriptionUpdate,
        now_ms: u64,
    ) -> Result<UserRecord, sled::Error> {
        let key = Self::user_key(user_id);
        let mut written: Option<UserRecord> = None;
        self.db.update_and_fetch(key.as_bytes(), |old| {
            let mut rec = old
                .and_then(Self::decode::<UserRecord>)
                .unwrap_or_else(|| UserRecord::new(user_id));
            update.apply(&mut rec, now_ms);
            let bytes = Self::encode(&rec);
            written = Some(rec);
            Some(bytes)
        })?;
        self.db.flush()?;
        written.ok_or_else(|| sled::Error::Unsupported("user update wrote nothing".to_string()))
    }

    pub fn find_user_by_customer(&self, customer_id: &str) -> Result<Option<UserRecord>, sled::Error> {
        for res in self.db.scan_prefix(b"user:") {
            let (_, v) = res?;
            if let Some(u) = Self::decode::<UserRecord>(&v) {
                if u.customer_id.as_deref() == Some(customer_id) {
                    return Ok(Some(u));
                }
            }
        }
        Ok(None)
    }
}
