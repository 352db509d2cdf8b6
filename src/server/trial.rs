//! Trial window tracking.
//!
//! The window is derived on every read from `trialStartedAt`; the only write is the
//! initial seed for a user seen for the first time.

use serde::Serialize;

use super::account::UserRecord;
use super::store::{iso_from_unix_ms, Store};
use crate::constants::DAY_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrialPhase {
    NoTrial,
    Trialing,
    Expired,
    Subscribed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialStatus {
    pub is_trialing: bool,
    pub is_subscribed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_ends_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_left: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_ended: Option<bool>,
    #[serde(skip)]
    pub phase: TrialPhase,
}

/// Whole days left in the window, rounded up and clamped at zero.
pub fn days_left(started_at_ms: u64, trial_days: u64, now_ms: u64) -> u64 {
    let ends_at = started_at_ms.saturating_add(trial_days.saturating_mul(DAY_MS));
    let remaining = ends_at.saturating_sub(now_ms);
    remaining.div_ceil(DAY_MS)
}

pub fn trial_phase(user: Option<&UserRecord>, trial_days: u64, now_ms: u64) -> TrialPhase {
    let Some(user) = user else {
        return TrialPhase::NoTrial;
    };
    if user.is_subscribed() {
        return TrialPhase::Subscribed;
    }
    match user.trial_started_at_unix_ms {
        None => TrialPhase::NoTrial,
        Some(started) if days_left(started, trial_days, now_ms) == 0 => TrialPhase::Expired,
        Some(_) => TrialPhase::Trialing,
    }
}

pub fn trial_status(user: Option<&UserRecord>, trial_days: u64, now_ms: u64) -> TrialStatus {
    let phase = trial_phase(user, trial_days, now_ms);
    let started = user.and_then(|u| u.trial_started_at_unix_ms);
    match (phase, started) {
        (TrialPhase::Trialing | TrialPhase::Expired, Some(started)) => {
            let left = days_left(started, trial_days, now_ms);
            let ends_at = started.saturating_add(trial_days.saturating_mul(DAY_MS));
            TrialStatus {
                is_trialing: left > 0,
                is_subscribed: false,
                trial_started_at: Some(iso_from_unix_ms(started)),
                trial_ends_at: Some(iso_from_unix_ms(ends_at)),
                days_left: Some(left),
                trial_ended: Some(left == 0),
                phase,
            }
        }
        _ => TrialStatus {
            is_trialing: false,
            is_subscribed: phase == TrialPhase::Subscribed,
            trial_started_at: None,
            trial_ends_at: None,
            days_left: None,
            trial_ended: None,
            phase,
        },
    }
}

/// Read the caller's trial state, starting the trial on first contact.
pub fn check_trial(
    store: &Store,
    user_id: &str,
    trial_days: u64,
    now_ms: u64,
) -> Result<TrialStatus, sled::Error> {
    let existing = store.get_user(user_id)?;
    let user = match existing {
        Some(u) if u.is_subscribed() || u.trial_started_at_unix_ms.is_some() => u,
        _ => {
            let seeded = store.seed_trial(user_id, now_ms)?;
            log::info!("trial started for user {user_id}");
            seeded
        }
    };
    Ok(trial_status(Some(&user), trial_days, now_ms))
}
