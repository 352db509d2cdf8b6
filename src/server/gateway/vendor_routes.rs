use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use super::account_routes::resolve_entitlement;
use super::identity::caller_id;
use super::{GatewayState, VoiceStartWrite};
use crate::constants::USAGE_TYPE_VOICE;
use crate::server::error::ApiError;
use crate::server::store::Store;
use crate::server::upstream::Vendor;
use crate::server::usage::{UsageEventInput, UsageType, VoicePhase};

fn opt_str(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn token_count(usage: Option<&Value>, key: &str) -> u64 {
    usage
        .and_then(|u| u.get(key))
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}

pub(super) async fn chat(
    State(st): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let user_id = caller_id(&st, &headers).await?;
    let messages = body
        .get("messages")
        .and_then(|v| v.as_array())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::validation("messages must be a non-empty array"))?
        .clone();
    let key = st
        .secrets
        .get_vendor_key(Vendor::Chat)
        .ok_or(ApiError::NotConfigured("chat api key"))?;

    let (base_url, model, max_tokens) = {
        let cfg = st.cfg.read();
        let chat = &cfg.vendors.chat;
        (
            chat.base_url.clone(),
            opt_str(&body, "model").unwrap_or_else(|| chat.default_model.clone()),
            chat.max_tokens,
        )
    };
    let mut payload = json!({ "model": model, "messages": messages });
    if let Some(n) = max_tokens {
        payload["max_tokens"] = json!(n);
    }

    let reply = st
        .upstream
        .chat_completion(&base_url, &key, &payload, st.request_timeout_seconds())
        .await?;
    let message = reply
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .cloned()
        .ok_or_else(|| ApiError::vendor("chat", "response has no choices"))?;
    let usage = reply.get("usage");
    let reply_model = opt_str(&reply, "model").unwrap_or(model);

    let mut input = UsageEventInput::new(&user_id, UsageType::LlmText);
    input.model = Some(reply_model.clone());
    input.input_tokens = token_count(usage, "prompt_tokens");
    input.output_tokens = token_count(usage, "completion_tokens");
    input.scenario_id = opt_str(&body, "scenarioId");
    input.scenario_title = opt_str(&body, "scenarioTitle");
    let event = st.store.record_usage(input)?;

    Ok(Json(json!({
        "message": message,
        "model": reply_model,
        "usage": {
            "inputTokens": event.input_tokens,
            "outputTokens": event.output_tokens,
        },
    })))
}

/// Log the zero-usage start event off the request path. Failures land in the ops log.
fn spawn_voice_start(
    store: Store,
    input: UsageEventInput,
    write: VoiceStartWrite,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let user_id = input.user_id.clone();
        if let Err(e) = write(&store, input) {
            note_voice_start_failure(&store, &user_id, &e);
        }
    })
}

fn note_voice_start_failure(store: &Store, user_id: &str, err: &sled::Error) {
    log::warn!("voice start event not recorded for {user_id}: {err}");
    store.add_event(
        "usage",
        "error",
        "usage_write_failed",
        &format!("voice start event not recorded: {err}"),
        json!({ "userId": user_id, "phase": "start" }),
    );
}

pub(super) async fn voice_signed_url(
    State(st): State<GatewayState>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let user_id = caller_id(&st, &headers).await?;
    let agent_id = q
        .get("agentId")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("agentId is required"))?
        .to_string();

    let (ent, _) = resolve_entitlement(&st, &user_id)?;
    if !ent.allowed {
        log::info!(
            "voice session refused for {user_id}: {:.1} of {:?} minutes used",
            ent.used_minutes,
            ent.quota_minutes
        );
        return Err(ApiError::QuotaExceeded(format!(
            "monthly voice quota of the {} plan is used up",
            ent.plan_name
        )));
    }

    let key = st
        .secrets
        .get_vendor_key(Vendor::Voice)
        .ok_or(ApiError::NotConfigured("voice api key"))?;
    let base_url = st.cfg.read().vendors.voice.base_url.clone();
    let signed_url = st
        .upstream
        .voice_signed_url(&base_url, &key, &agent_id, st.request_timeout_seconds())
        .await?;

    let mut input = UsageEventInput::new(&user_id, UsageType::Voice);
    input.agent_id = Some(agent_id);
    input.scenario_id = q.get("scenarioId").filter(|s| !s.is_empty()).cloned();
    input.scenario_title = q.get("scenarioTitle").filter(|s| !s.is_empty()).cloned();
    input.phase = Some(VoicePhase::Start);
    let _ = spawn_voice_start(st.store.clone(), input, st.voice_start_write);

    Ok(Json(json!({ "signedUrl": signed_url })))
}

pub(super) async fn voice_session_end(
    State(st): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let user_id = caller_id(&st, &headers).await?;
    let Value::Object(mut fields) = body else {
        return Err(ApiError::validation("body must be a JSON object"));
    };
    // Identity, type and phase come from the route, never from the client.
    fields.insert("userId".to_string(), json!(user_id));
    fields.insert("type".to_string(), json!(USAGE_TYPE_VOICE));
    fields.insert("phase".to_string(), json!("end"));

    let input = UsageEventInput::from_json(&Value::Object(fields))?;
    st.store.record_usage(input)?;
    Ok(Json(json!({ "success": true })))
}
