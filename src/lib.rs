mod app_state;
pub mod constants;
pub mod server;

use std::path::PathBuf;

use crate::app_state::build_state;
use crate::constants::DATA_DIR_ENV;
use crate::server::gateway::serve_in_background;

pub use crate::app_state::{load_or_init_config, AppState};

/// `$ROLEPLAY_DATA_DIR`, or `./user-data` next to the working directory.
fn data_dir() -> PathBuf {
    std::env::var(DATA_DIR_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("user-data"))
}

async fn serve(user_data_dir: PathBuf) -> anyhow::Result<()> {
    let state = build_state(
        user_data_dir.join("config.toml"),
        user_data_dir.join("data"),
    )?;
    log::info!("config: {}", state.config_path.display());
    serve_in_background(state.gateway).await
}

pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(data_dir()))
}
