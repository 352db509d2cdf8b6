use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use super::identity::caller_id;
use super::GatewayState;
use crate::server::error::ApiError;
use crate::server::ratings::{aggregate, aggregate_all, parse_rating};
use crate::server::store::unix_ms;

fn scenario_param(q: &HashMap<String, String>) -> Option<&str> {
    q.get("scenarioId")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

pub(super) async fn list_ratings(
    State(st): State<GatewayState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    if q.get("all").is_some_and(|v| v == "true") {
        let ratings = st.store.list_all_ratings()?;
        return Ok(Json(json!({ "aggregates": aggregate_all(&ratings) })));
    }
    let Some(scenario_id) = scenario_param(&q) else {
        return Err(ApiError::validation("scenarioId or all=true is required"));
    };
    let ratings = st.store.list_scenario_ratings(scenario_id)?;
    Ok(Json(json!({ "aggregate": aggregate(scenario_id, &ratings) })))
}

pub(super) async fn submit_rating(
    State(st): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let user_id = caller_id(&st, &headers).await?;
    let scenario_id = body
        .get("scenarioId")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("scenarioId is required"))?
        .to_string();
    let value = parse_rating(body.get("rating"))?;

    let rating = st
        .store
        .upsert_rating(&scenario_id, &user_id, value, unix_ms())?;
    let all = st.store.list_scenario_ratings(&scenario_id)?;
    Ok(Json(json!({
        "rating": rating,
        "aggregate": aggregate(&scenario_id, &all),
    })))
}

pub(super) async fn user_ratings(
    State(st): State<GatewayState>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let user_id = caller_id(&st, &headers).await?;
    if let Some(scenario_id) = scenario_param(&q) {
        let rating = st.store.get_rating(scenario_id, &user_id)?;
        return Ok(Json(json!({ "rating": rating })));
    }
    let ratings = st.store.list_user_ratings(&user_id)?;
    Ok(Json(json!({ "ratings": ratings })))
}
