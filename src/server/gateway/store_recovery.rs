use std::path::{Path, PathBuf};

use crate::server::store::{maintain_store_dir, unix_ms, Store};

/// Open the store under `base/sled`.
///
/// Only a panicking or corrupted database is moved aside and recreated. Any other open
/// error (most often the lock held by a second instance) fails startup and leaves the
/// data untouched.
pub fn open_store_dir(base: PathBuf) -> anyhow::Result<Store> {
    std::fs::create_dir_all(&base)?;
    let path = base.join("sled");
    std::fs::create_dir_all(&path)?;

    let attempt = std::panic::catch_unwind(|| {
        if let Err(e) = maintain_store_dir(&path) {
            log::warn!("store maintenance skipped: {e}");
        }
        Store::open(&path)
    });

    match attempt {
        Ok(Ok(store)) => Ok(store),
        Ok(Err(e @ sled::Error::Corruption { .. })) => {
            log::warn!("store is corrupted, recreating DB: {e}");
            recover_store_dir(&path)?;
            reopen_after_recovery(&path)
        }
        Ok(Err(e)) => {
            log::error!("store open failed at {}: {e}", path.display());
            Err(anyhow::anyhow!("failed to open store at {}: {e}", path.display()))
        }
        Err(_) => {
            log::warn!("store open panicked, recreating DB");
            recover_store_dir(&path)?;
            reopen_after_recovery(&path)
        }
    }
}

fn recover_store_dir(path: &Path) -> anyhow::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let backup = parent.join(format!("sled.corrupt.{}", unix_ms()));
    if backup.exists() {
        let _ = std::fs::remove_dir_all(&backup);
    }
    if path.exists() {
        if let Err(e) = std::fs::rename(path, &backup) {
            log::warn!(
                "failed to move corrupted store to {}: {e}",
                backup.display()
            );
            std::fs::remove_dir_all(path).map_err(|e2| {
                log::warn!("store recovery failed: {e2}");
                anyhow::anyhow!("failed to remove corrupted store dir: {e2}")
            })?;
        }
    }
    std::fs::create_dir_all(path)?;
    Ok(())
}

fn reopen_after_recovery(path: &Path) -> anyhow::Result<Store> {
    match std::panic::catch_unwind(|| Store::open(path)) {
        Ok(Ok(store)) => Ok(store),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(anyhow::anyhow!(
            "sled panicked when opening recovered store"
        )),
    }
}
