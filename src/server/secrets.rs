use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::upstream::Vendor;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct SecretsFile {
    /// Vendor API keys by vendor name (`chat`, `voice`, `billing`).
    #[serde(default)]
    vendor_keys: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    admin_password: String,
    /// HMAC key for admin session tokens. Generated on first start.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    session_key: String,
    /// Payment-provider webhook signing secret.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    webhook_secret: String,
}

/// Secrets live in `secrets.json` beside `config.toml`. Nothing here is ever echoed by the API.
#[derive(Clone)]
pub struct SecretStore {
    path: PathBuf,
    inner: Arc<Mutex<SecretsFile>>,
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

impl SecretStore {
    pub fn new(path: PathBuf) -> Self {
        let inner = Self::load_from_disk(&path).unwrap_or_default();
        Self {
            path,
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn load_from_disk(path: &PathBuf) -> Option<SecretsFile> {
        let txt = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&txt).ok()
    }

    fn persist(&self, data: &SecretsFile) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let txt = serde_json::to_string_pretty(data).map_err(|e| e.to_string())?;
        std::fs::write(&self.path, txt).map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn get_vendor_key(&self, vendor: Vendor) -> Option<String> {
        self.inner
            .lock()
            .vendor_keys
            .get(vendor.as_str())
            .and_then(|k| non_empty(k))
    }

    pub fn set_vendor_key(&self, vendor: Vendor, key: &str) -> Result<(), String> {
        let mut data = self.inner.lock();
        data.vendor_keys
            .insert(vendor.as_str().to_string(), key.trim().to_string());
        self.persist(&data)
    }

    pub fn get_admin_password(&self) -> Option<String> {
        non_empty(&self.inner.lock().admin_password)
    }

    pub fn set_admin_password(&self, password: &str) -> Result<(), String> {
        let mut data = self.inner.lock();
        data.admin_password = password.to_string();
        self.persist(&data)
    }

    pub fn get_webhook_secret(&self) -> Option<String> {
        non_empty(&self.inner.lock().webhook_secret)
    }

    pub fn set_webhook_secret(&self, secret: &str) -> Result<(), String> {
        let mut data = self.inner.lock();
        data.webhook_secret = secret.trim().to_string();
        self.persist(&data)
    }

    pub fn get_session_key(&self) -> Option<String> {
        non_empty(&self.inner.lock().session_key)
    }

    pub fn ensure_session_key(&self) -> Result<String, String> {
        if let Some(k) = self.get_session_key() {
            return Ok(k);
        }
        self.rotate_session_key()
    }

    /// Replacing the key logs out every admin session.
    pub fn rotate_session_key(&self) -> Result<String, String> {
        let k = Self::new_session_key();
        let mut data = self.inner.lock();
        data.session_key = k.clone();
        self.persist(&data)?;
        Ok(k)
    }

    fn new_session_key() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }
}
