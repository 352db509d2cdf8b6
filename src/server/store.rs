use std::path::Path;

mod accounts;
mod maintenance;
mod ops_events;
mod ratings;
mod time_and_keys;
mod usage_log;

pub use maintenance::maintain_store_dir;
pub use ops_events::OpsEvent;
pub use time_and_keys::{iso_from_unix_ms, unix_ms};

/// Handle to the embedded document store. Cheap to clone; every clone shares one database.
#[derive(Clone)]
pub struct Store {
    db: sled::Db,
}

impl Store {
    const MAX_EVENTS: usize = 200;

    fn allowed_key_prefixes() -> [&'static [u8]; 4] {
        [b"usage:", b"rating:", b"user:", b"event:"]
    }

    pub fn open(path: &Path) -> Result<Self, sled::Error> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Option<T> {
        serde_json::from_slice(bytes).ok()
    }

    fn encode<T: serde::Serialize>(value: &T) -> Vec<u8> {
        serde_json::to_vec(value).unwrap_or_default()
    }
}
