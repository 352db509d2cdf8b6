use std::path::Path;

use super::time_and_keys::is_allowed_key;
use super::Store;

/// Best-effort cleanup before the store is opened:
/// - remove keys outside the known document prefixes
/// - prune the ops event log to MAX_EVENTS
///
/// Usage, rating and user documents are never pruned.
pub fn maintain_store_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        return Ok(());
    }

    // If there's no DB yet, nothing to do.
    if !path.join("db").exists() {
        return Ok(());
    }

    let db = sled::open(path)?;
    let mut batch: Vec<sled::IVec> = Vec::with_capacity(2048);
    let mut removed = 0usize;
    for res in db.iter() {
        let (k, _v) = res?;
        if !is_allowed_key(&k) {
            batch.push(k);
            if batch.len() >= 2048 {
                removed += batch.len();
                for key in batch.drain(..) {
                    let _ = db.remove(key);
                }
            }
        }
    }
    removed += batch.len();
    for key in batch.drain(..) {
        let _ = db.remove(key);
    }
    if removed > 0 {
        log::info!("store maintenance removed {removed} unexpected keys");
    }

    Store::prune_events_db(&db);
    db.flush()?;
    Ok(())
}
