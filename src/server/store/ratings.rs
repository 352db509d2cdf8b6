use super::time_and_keys::key_part;
use super::Store;
use crate::server::ratings::Rating;

impl Store {
    fn rating_key(scenario_id: &str, user_id: &str) -> String {
        format!("rating:{}:{}", key_part(scenario_id), key_part(user_id))
    }

    /// Insert or replace the caller's rating in one atomic read-modify-write.
    ///
    /// `createdAt` survives re-rating; `updatedAt` is always `now_ms`.
    pub fn upsert_rating(
        &self,
        scenario_id: &str,
        user_id: &str,
        rating: u8,
        now_ms: u64,
    ) -> Result<Rating, sled::Error> {
        let key = Self::rating_key(scenario_id, user_id);
        let mut written: Option<Rating> = None;
        self.db.update_and_fetch(key.as_bytes(), |old| {
            let created_at_unix_ms = old
                .and_then(Self::decode::<Rating>)
                .map(|r| r.created_at_unix_ms)
                .unwrap_or(now_ms);
            let next = Rating {
                scenario_id: scenario_id.to_string(),
                user_id: user_id.to_string(),
                rating,
                created_at_unix_ms,
                updated_at_unix_ms: now_ms,
            };
            let bytes = Self::encode(&next);
            written = Some(next);
            Some(bytes)
        })?;
        self.db.flush()?;
        written.ok_or_else(|| sled::Error::Unsupported("rating upsert wrote nothing".to_string()))
    }

    pub fn get_rating(&self, scenario_id: &str, user_id: &str) -> Result<Option<Rating>, sled::Error> {
        let key = Self::rating_key(scenario_id, user_id);
        Ok(self
            .db
            .get(key.as_bytes())?
            .and_then(|v| Self::decode::<Rating>(&v)))
    }

    fn scan_ratings(&self, prefix: &str) -> Result<Vec<Rating>, sled::Error> {
        let mut out = Vec::new();
        for res in self.db.scan_prefix(prefix.as_bytes()) {
            let (_, v) = res?;
            if let Some(r) = Self::decode::<Rating>(&v) {
                out.push(r);
            }
        }
        Ok(out)
    }

    pub fn list_scenario_ratings(&self, scenario_id: &str) -> Result<Vec<Rating>, sled::Error> {
        self.scan_ratings(&format!("rating:{}:", key_part(scenario_id)))
    }

    pub fn list_all_ratings(&self) -> Result<Vec<Rating>, sled::Error> {
        self.scan_ratings("rating:")
    }

    pub fn list_user_ratings(&self, user_id: &str) -> Result<Vec<Rating>, sled::Error> {
        let mut all = self.list_all_ratings()?;
        all.retain(|r| r.user_id == user_id);
        Ok(all)
    }
}
