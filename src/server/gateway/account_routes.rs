use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use super::identity::caller_id;
use super::GatewayState;
use crate::server::error::ApiError;
use crate::server::plans::{entitlement, Entitlement};
use crate::server::store::unix_ms;
use crate::server::trial::{check_trial, TrialStatus};
use crate::server::usage::{month_start_unix_ms, voice_seconds_for_user, DateRange};

/// Trial state plus the quota decision for `user_id`, counting this month's voice time.
pub(super) fn resolve_entitlement(
    st: &GatewayState,
    user_id: &str,
) -> Result<(Entitlement, TrialStatus), ApiError> {
    let (trial_days, trial_plan) = {
        let cfg = st.cfg.read();
        (cfg.trial.days, cfg.trial.plan)
    };
    let now = unix_ms();
    let trial = check_trial(&st.store, user_id, trial_days, now)?;
    let user = st.store.get_user(user_id)?;

    let month = DateRange {
        start_ms: Some(month_start_unix_ms(now)),
        end_ms: None,
    };
    let events = st.store.list_user_usage(user_id, &month)?;
    let used_seconds = voice_seconds_for_user(&events, user_id);

    let ent = entitlement(
        &st.catalog,
        user.as_ref(),
        trial.phase,
        trial_plan,
        used_seconds,
    );
    Ok((ent, trial))
}

pub(super) async fn trial(
    State(st): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<TrialStatus>, ApiError> {
    let user_id = caller_id(&st, &headers).await?;
    let days = st.cfg.read().trial.days;
    let status = check_trial(&st.store, &user_id, days, unix_ms())?;
    Ok(Json(status))
}

pub(super) async fn entitlement_route(
    State(st): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user_id = caller_id(&st, &headers).await?;
    let (ent, trial) = resolve_entitlement(&st, &user_id)?;
    Ok(Json(json!({ "entitlement": ent, "trial": trial })))
}

pub(super) async fn plans(State(st): State<GatewayState>) -> Json<Value> {
    let (trial_days, trial_plan) = {
        let cfg = st.cfg.read();
        (cfg.trial.days, cfg.trial.plan)
    };
    Json(json!({
        "plans": st.catalog.list(),
        "trial": { "days": trial_days, "plan": trial_plan },
    }))
}
