use std::path::{Path, PathBuf};

use crate::server::config::AppConfig;
use crate::server::gateway::{open_store_dir, GatewayState};
use crate::server::secrets::SecretStore;
use crate::server::upstream::Vendor;

fn mask_key_preview(key: &str) -> String {
    let k = key.trim();
    let chars: Vec<char> = k.chars().collect();
    if chars.len() < 10 {
        return "set".to_string();
    }
    let start_len = std::cmp::min(6, chars.len().saturating_sub(4));
    let start: String = chars.iter().take(start_len).collect();
    let end: String = chars
        .iter()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{start}******{end}")
}

pub struct AppState {
    pub config_path: PathBuf,
    pub gateway: GatewayState,
    pub secrets: SecretStore,
}

pub fn load_or_init_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        let txt = std::fs::read_to_string(path)?;
        let cfg: AppConfig = toml::from_str(&txt)?;
        return Ok(cfg);
    }
    let cfg = AppConfig::default_config();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(&cfg)?)?;
    log::info!("wrote default config to {}", path.display());
    Ok(cfg)
}

/// Layout under the data directory:
/// - `config.toml`
/// - `secrets.json`
/// - `data/sled` (usage, ratings, users, ops events)
pub fn build_state(config_path: PathBuf, data_dir: PathBuf) -> anyhow::Result<AppState> {
    let cfg = load_or_init_config(&config_path)?;
    let secrets_path = config_path
        .parent()
        .unwrap_or(Path::new("."))
        .join("secrets.json");
    let secrets = SecretStore::new(secrets_path);
    secrets
        .ensure_session_key()
        .map_err(|e| anyhow::anyhow!("cannot persist admin session key: {e}"))?;

    for vendor in [Vendor::Chat, Vendor::Voice, Vendor::Billing] {
        let key_ref = secrets
            .get_vendor_key(vendor)
            .as_deref()
            .map(mask_key_preview)
            .unwrap_or_else(|| "-".to_string());
        log::info!("{} api key: {key_ref}", vendor.as_str());
    }
    if secrets.get_admin_password().is_none() {
        log::warn!("no admin password in secrets.json; admin routes will refuse logins");
    }

    let store = open_store_dir(data_dir)?;
    let gateway = GatewayState::new(cfg, store, secrets.clone());
    gateway
        .store
        .add_event("app", "info", "app_started", "service started", serde_json::Value::Null);

    Ok(AppState {
        config_path,
        gateway,
        secrets,
    })
}
