use std::net::SocketAddr;
use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use serde_json::json;

use super::config::AppConfig;
use super::plans::PlanCatalog;
use super::secrets::SecretStore;
use super::store::Store;
use super::upstream::UpstreamClient;
use super::usage::{UsageEvent, UsageEventInput};

mod account_routes;
mod admin_routes;
mod billing_routes;
mod identity;
mod rating_routes;
mod store_recovery;
mod usage_routes;
mod vendor_routes;

pub use store_recovery::open_store_dir;

/// Writes the voice-session start event on the spawned task.
pub type VoiceStartWrite = fn(&Store, UsageEventInput) -> Result<UsageEvent, sled::Error>;

#[derive(Clone)]
pub struct GatewayState {
    pub cfg: Arc<RwLock<AppConfig>>,
    pub catalog: Arc<PlanCatalog>,
    pub store: Store,
    pub upstream: UpstreamClient,
    pub secrets: SecretStore,
    pub voice_start_write: VoiceStartWrite,
}

impl GatewayState {
    pub fn new(cfg: AppConfig, store: Store, secrets: SecretStore) -> Self {
        let catalog = Arc::new(PlanCatalog::from_config(&cfg.plans));
        Self {
            cfg: Arc::new(RwLock::new(cfg)),
            catalog,
            store,
            upstream: UpstreamClient::new(),
            secrets,
            voice_start_write: Store::record_usage,
        }
    }

    pub(crate) fn request_timeout_seconds(&self) -> u64 {
        self.cfg.read().vendors.request_timeout_seconds.max(1)
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/usage",
            post(usage_routes::record_usage).get(usage_routes::usage_summary),
        )
        .route(
            "/ratings",
            get(rating_routes::list_ratings).post(rating_routes::submit_rating),
        )
        .route("/ratings/user", get(rating_routes::user_ratings))
        .route("/trial", get(account_routes::trial))
        .route("/entitlement", get(account_routes::entitlement_route))
        .route("/plans", get(account_routes::plans))
        .route("/chat", post(vendor_routes::chat))
        .route("/voice/signed-url", get(vendor_routes::voice_signed_url))
        .route("/voice/session-end", post(vendor_routes::voice_session_end))
        .route("/billing/checkout", post(billing_routes::checkout))
        .route("/billing/webhook", post(billing_routes::webhook))
        .route("/admin/login", post(admin_routes::login))
        .route("/admin/logout", post(admin_routes::logout))
        .route("/admin/session", get(admin_routes::session))
        .route("/admin/events", get(admin_routes::events))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

pub async fn serve_in_background(state: GatewayState) -> anyhow::Result<()> {
    let cfg = state.cfg.read().clone();
    let addr: SocketAddr = format!("{}:{}", cfg.listen.host, cfg.listen.port).parse()?;

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("ctrl-c handler unavailable: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}
