//! Usage events and the summaries built from them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiError;
use super::store::iso_from_unix_ms;
use crate::constants::{USAGE_TYPE_LLM_TEXT, USAGE_TYPE_VOICE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageType {
    #[serde(rename = "llm-text")]
    LlmText,
    #[serde(rename = "voice")]
    Voice,
}

impl UsageType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            USAGE_TYPE_LLM_TEXT => Some(UsageType::LlmText),
            USAGE_TYPE_VOICE => Some(UsageType::Voice),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoicePhase {
    Start,
    End,
}

/// One billable vendor interaction. Never updated after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: UsageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub duration_seconds: u64,
    #[serde(default)]
    pub characters_used: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<VoicePhase>,
    pub created_at_unix_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageEventInput {
    pub user_id: String,
    pub kind: UsageType,
    pub model: Option<String>,
    pub agent_id: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_seconds: u64,
    pub characters_used: u64,
    pub scenario_id: Option<String>,
    pub scenario_title: Option<String>,
    pub conversation_id: Option<String>,
    pub phase: Option<VoicePhase>,
}

fn opt_str(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn opt_count(body: &Value, key: &str) -> Result<u64, ApiError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(0),
        Some(v) => {
            if let Some(n) = v.as_u64() {
                return Ok(n);
            }
            match v.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 => Ok(f.round() as u64),
                _ => Err(ApiError::validation(format!(
                    "{key} must be a non-negative number"
                ))),
            }
        }
    }
}

impl UsageEventInput {
    pub fn new(user_id: &str, kind: UsageType) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            model: None,
            agent_id: None,
            input_tokens: 0,
            output_tokens: 0,
            duration_seconds: 0,
            characters_used: 0,
            scenario_id: None,
            scenario_title: None,
            conversation_id: None,
            phase: None,
        }
    }

    /// Validate a client-supplied event. Only `userId` and `type` are required.
    pub fn from_json(body: &Value) -> Result<Self, ApiError> {
        let Some(user_id) = opt_str(body, "userId") else {
            return Err(ApiError::validation("userId is required"));
        };
        let Some(raw_type) = opt_str(body, "type") else {
            return Err(ApiError::validation("type is required"));
        };
        let Some(kind) = UsageType::parse(&raw_type) else {
            return Err(ApiError::validation(format!(
                "type must be \"{USAGE_TYPE_LLM_TEXT}\" or \"{USAGE_TYPE_VOICE}\""
            )));
        };
        let phase = match opt_str(body, "phase").as_deref() {
            None => None,
            Some("start") => Some(VoicePhase::Start),
            Some("end") => Some(VoicePhase::End),
            Some(_) => return Err(ApiError::validation("phase must be \"start\" or \"end\"")),
        };

        Ok(Self {
            user_id,
            kind,
            model: opt_str(body, "model"),
            agent_id: opt_str(body, "agentId"),
            input_tokens: opt_count(body, "inputTokens")?,
            output_tokens: opt_count(body, "outputTokens")?,
            duration_seconds: opt_count(body, "durationSeconds")?,
            characters_used: opt_count(body, "charactersUsed")?,
            scenario_id: opt_str(body, "scenarioId"),
            scenario_title: opt_str(body, "scenarioTitle"),
            conversation_id: opt_str(body, "conversationId"),
            phase,
        })
    }

    /// Stamp the event. Counters that do not belong to the event type are zeroed.
    pub fn into_event(self, id: String, created_at_unix_ms: u64) -> UsageEvent {
        let (input_tokens, output_tokens, duration_seconds, characters_used, phase) =
            match self.kind {
                UsageType::LlmText => (self.input_tokens, self.output_tokens, 0, 0, None),
                UsageType::Voice => (
                    0,
                    0,
                    self.duration_seconds,
                    self.characters_used,
                    self.phase,
                ),
            };
        UsageEvent {
            id,
            user_id: self.user_id,
            kind: self.kind,
            model: self.model,
            agent_id: self.agent_id,
            input_tokens,
            output_tokens,
            duration_seconds,
            characters_used,
            scenario_id: self.scenario_id,
            scenario_title: self.scenario_title,
            conversation_id: self.conversation_id,
            phase,
            created_at_unix_ms,
        }
    }
}

/// Inclusive time window in unix milliseconds. Open ends mean "all time".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
}

fn parse_bound(raw: &str, end_of_day: bool) -> Result<u64, ApiError> {
    let raw = raw.trim();
    let ms = if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let t = if end_of_day {
            day.and_hms_milli_opt(23, 59, 59, 999)
        } else {
            day.and_hms_opt(0, 0, 0)
        };
        t.map(|t| t.and_utc().timestamp_millis())
    } else {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.timestamp_millis())
    };
    match ms {
        Some(ms) if ms >= 0 => Ok(ms as u64),
        _ => Err(ApiError::validation(format!(
            "invalid date {raw:?} (expected YYYY-MM-DD or RFC 3339)"
        ))),
    }
}

impl DateRange {
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, ApiError> {
        let start_ms = start
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_bound(s, false))
            .transpose()?;
        let end_ms = end
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_bound(s, true))
            .transpose()?;
        if let (Some(s), Some(e)) = (start_ms, end_ms) {
            if s > e {
                return Err(ApiError::validation("startDate must not be after endDate"));
            }
        }
        Ok(Self { start_ms, end_ms })
    }

    pub fn contains(&self, unix_ms: u64) -> bool {
        self.start_ms.map_or(true, |s| unix_ms >= s) && self.end_ms.map_or(true, |e| unix_ms <= e)
    }
}

/// First millisecond of the UTC calendar month containing `now_ms`.
pub fn month_start_unix_ms(now_ms: u64) -> u64 {
    let Some(now) = Utc.timestamp_millis_opt(now_ms as i64).single() else {
        return 0;
    };
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .map(|t| t.timestamp_millis().max(0) as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextTotals {
    pub events: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceTotals {
    pub events: u64,
    pub start_events: u64,
    pub end_events: u64,
    /// Distinct vendor conversation ids seen in the window.
    pub conversations: u64,
    pub duration_seconds: u64,
    pub duration_minutes: f64,
    pub characters_used: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub events: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_seconds: u64,
    pub characters_used: u64,
}

impl Totals {
    fn add(&mut self, e: &UsageEvent) {
        self.events += 1;
        self.input_tokens = self.input_tokens.saturating_add(e.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(e.output_tokens);
        self.duration_seconds = self.duration_seconds.saturating_add(e.duration_seconds);
        self.characters_used = self.characters_used.saturating_add(e.characters_used);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioTotals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub total_events: u64,
    pub llm_text: TextTotals,
    pub voice: VoiceTotals,
    pub by_user: BTreeMap<String, Totals>,
    pub by_scenario: BTreeMap<String, ScenarioTotals>,
}

const UNASSIGNED_SCENARIO: &str = "unassigned";

pub fn summarize<'a, I>(events: I, range: &DateRange) -> UsageSummary
where
    I: IntoIterator<Item = &'a UsageEvent>,
{
    let mut out = UsageSummary {
        start_date: range.start_ms.map(iso_from_unix_ms),
        end_date: range.end_ms.map(iso_from_unix_ms),
        ..Default::default()
    };
    let mut conversations: BTreeSet<&str> = BTreeSet::new();

    for e in events {
        if !range.contains(e.created_at_unix_ms) {
            continue;
        }
        out.total_events += 1;
        match e.kind {
            UsageType::LlmText => {
                let t = &mut out.llm_text;
                t.events += 1;
                t.input_tokens = t.input_tokens.saturating_add(e.input_tokens);
                t.output_tokens = t.output_tokens.saturating_add(e.output_tokens);
            }
            UsageType::Voice => {
                let v = &mut out.voice;
                v.events += 1;
                match e.phase {
                    Some(VoicePhase::Start) => v.start_events += 1,
                    Some(VoicePhase::End) => v.end_events += 1,
                    None => {}
                }
                if let Some(id) = e.conversation_id.as_deref() {
                    conversations.insert(id);
                }
                v.duration_seconds = v.duration_seconds.saturating_add(e.duration_seconds);
                v.characters_used = v.characters_used.saturating_add(e.characters_used);
            }
        }

        out.by_user.entry(e.user_id.clone()).or_default().add(e);

        let scenario_key = e
            .scenario_id
            .clone()
            .unwrap_or_else(|| UNASSIGNED_SCENARIO.to_string());
        let scenario = out.by_scenario.entry(scenario_key).or_default();
        if scenario.title.is_none() {
            scenario.title = e.scenario_title.clone();
        }
        scenario.totals.add(e);
    }

    out.llm_text.total_tokens = out
        .llm_text
        .input_tokens
        .saturating_add(out.llm_text.output_tokens);
    out.voice.conversations = conversations.len() as u64;
    out.voice.duration_minutes = out.voice.duration_seconds as f64 / 60.0;
    out
}

/// Voice seconds attributed to `user_id` among `events`.
pub fn voice_seconds_for_user<'a, I>(events: I, user_id: &str) -> u64
where
    I: IntoIterator<Item = &'a UsageEvent>,
{
    events
        .into_iter()
        .filter(|e| e.kind == UsageType::Voice && e.user_id == user_id)
        .fold(0u64, |acc, e| acc.saturating_add(e.duration_seconds))
}
