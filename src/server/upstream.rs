use std::error::Error;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use super::error::ApiError;

/// External services this backend delegates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Chat,
    Voice,
    Billing,
    Identity,
}

impl Vendor {
    pub fn as_str(self) -> &'static str {
        match self {
            Vendor::Chat => "chat",
            Vendor::Voice => "voice",
            Vendor::Billing => "billing",
            Vendor::Identity => "identity",
        }
    }
}

#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

pub(crate) fn build_upstream_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let mut rel = path.trim_start_matches('/');
    if base.ends_with("/v1") && rel.starts_with("v1/") {
        rel = rel.trim_start_matches("v1/");
    }
    format!("{}/{}", base, rel)
}

fn redact_url_for_logs(url: &reqwest::Url) -> String {
    // Avoid logging secrets in query strings. Keep only scheme://host[:port]/path.
    let scheme = url.scheme();
    let host = url.host_str().unwrap_or("<unknown>");
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    format!("{scheme}://{host}{port}{}", url.path())
}

fn format_reqwest_error_for_logs(e: &reqwest::Error) -> String {
    let kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else {
        "request"
    };

    let mut parts: Vec<String> = vec![format!("request error ({kind})")];
    if let Some(url) = e.url() {
        parts.push(format!("url={}", redact_url_for_logs(url)));
    }

    let mut src: Option<&(dyn Error + 'static)> = e.source();
    let mut causes: Vec<String> = Vec::new();
    while let Some(err) = src {
        let s = err.to_string();
        if !s.is_empty() && !causes.contains(&s) {
            causes.push(s);
        }
        if causes.len() >= 2 {
            break;
        }
        src = err.source();
    }
    if !causes.is_empty() {
        parts.push(format!("cause={}", causes.join(" | ")));
    }
    parts.join("; ")
}

fn summarize_body_for_logs(body: &Value) -> String {
    let mut s = serde_json::to_string(body).unwrap_or_else(|_| "<unserializable>".to_string());
    const LIMIT: usize = 400;
    if s.len() > LIMIT {
        let mut cut = LIMIT;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("...");
    }
    s
}

fn bearer(key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(hv) = HeaderValue::from_str(&format!("Bearer {}", key.trim())) {
        headers.insert(AUTHORIZATION, hv);
    }
    headers
}

/// Turn a vendor reply into a value or a logged `VendorError`.
fn expect_success(
    vendor: Vendor,
    res: Result<(u16, Value), reqwest::Error>,
) -> Result<Value, ApiError> {
    match res {
        Ok((status, body)) if (200..300).contains(&status) => Ok(body),
        Ok((status, body)) => {
            let detail = format!("http {status}: {}", summarize_body_for_logs(&body));
            log::warn!("{} vendor returned {detail}", vendor.as_str());
            Err(ApiError::vendor(vendor.as_str(), detail))
        }
        Err(e) => {
            let detail = format_reqwest_error_for_logs(&e);
            log::warn!("{} vendor unreachable: {detail}", vendor.as_str());
            Err(ApiError::vendor(vendor.as_str(), detail))
        }
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent("roleplay-api/0.4")
            // Avoid hanging forever on broken upstream TCP handshakes.
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("http client builder failed, using defaults: {e}");
                reqwest::Client::new()
            });
        Self { client }
    }

    async fn read_json(r: reqwest::Response) -> (u16, Value) {
        let status = r.status().as_u16();
        let j = r.json::<Value>().await.unwrap_or(Value::Null);
        (status, j)
    }

    pub async fn post_json(
        &self,
        url: &str,
        headers: HeaderMap,
        payload: &Value,
        timeout_seconds: u64,
    ) -> Result<(u16, Value), reqwest::Error> {
        let r = self
            .client
            .post(url)
            .headers(headers)
            .timeout(Duration::from_secs(timeout_seconds))
            .json(payload)
            .send()
            .await?;
        Ok(Self::read_json(r).await)
    }

    pub async fn post_form(
        &self,
        url: &str,
        headers: HeaderMap,
        form: &[(String, String)],
        timeout_seconds: u64,
    ) -> Result<(u16, Value), reqwest::Error> {
        let r = self
            .client
            .post(url)
            .headers(headers)
            .timeout(Duration::from_secs(timeout_seconds))
            .form(form)
            .send()
            .await?;
        Ok(Self::read_json(r).await)
    }

    pub async fn get_json(
        &self,
        url: &str,
        headers: HeaderMap,
        timeout_seconds: u64,
    ) -> Result<(u16, Value), reqwest::Error> {
        let r = self
            .client
            .get(url)
            .headers(headers)
            .timeout(Duration::from_secs(timeout_seconds))
            .send()
            .await?;
        Ok(Self::read_json(r).await)
    }

    /// Chat-completion call. Returns the vendor body untouched.
    pub async fn chat_completion(
        &self,
        base_url: &str,
        api_key: &str,
        payload: &Value,
        timeout_seconds: u64,
    ) -> Result<Value, ApiError> {
        let url = build_upstream_url(base_url, "/v1/chat/completions");
        let res = self
            .post_json(&url, bearer(api_key), payload, timeout_seconds)
            .await;
        expect_success(Vendor::Chat, res)
    }

    fn voice_headers(api_key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(hv) = HeaderValue::from_str(api_key.trim()) {
            headers.insert(HeaderName::from_static("xi-api-key"), hv);
        }
        headers
    }

    /// Signed websocket URL for one voice conversation with `agent_id`.
    pub async fn voice_signed_url(
        &self,
        base_url: &str,
        api_key: &str,
        agent_id: &str,
        timeout_seconds: u64,
    ) -> Result<String, ApiError> {
        let url = format!(
            "{}?agent_id={}",
            build_upstream_url(base_url, "/v1/convai/conversation/get_signed_url"),
            urlencoding::encode(agent_id)
        );
        let res = self
            .get_json(&url, Self::voice_headers(api_key), timeout_seconds)
            .await;
        let body = expect_success(Vendor::Voice, res)?;
        body.get("signed_url")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::vendor("voice", "response missing signed_url"))
    }

    /// Account-level usage as reported by the voice vendor. Passed through as is.
    pub async fn voice_account_usage(
        &self,
        base_url: &str,
        api_key: &str,
        timeout_seconds: u64,
    ) -> Result<Value, ApiError> {
        let url = build_upstream_url(base_url, "/v1/user/subscription");
        let res = self
            .get_json(&url, Self::voice_headers(api_key), timeout_seconds)
            .await;
        expect_success(Vendor::Voice, res)
    }

    /// Hosted checkout page for a subscription to `price_id`. Returns its URL.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_checkout_session(
        &self,
        base_url: &str,
        api_key: &str,
        price_id: &str,
        plan_key: &str,
        user_id: &str,
        success_url: &str,
        cancel_url: &str,
        timeout_seconds: u64,
    ) -> Result<String, ApiError> {
        let url = build_upstream_url(base_url, "/v1/checkout/sessions");
        let form: Vec<(String, String)> = [
            ("mode", "subscription"),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("client_reference_id", user_id),
            ("metadata[userId]", user_id),
            ("metadata[planType]", plan_key),
            ("subscription_data[metadata][userId]", user_id),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let res = self
            .post_form(&url, bearer(api_key), &form, timeout_seconds)
            .await;
        let body = expect_success(Vendor::Billing, res)?;
        body.get("url")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::vendor("billing", "checkout session missing url"))
    }

    /// Ask the identity provider who owns `session_token`.
    pub async fn verify_identity(
        &self,
        verify_url: &str,
        session_token: &str,
        timeout_seconds: u64,
    ) -> Result<String, ApiError> {
        let res = self
            .get_json(verify_url, bearer(session_token), timeout_seconds)
            .await;
        if let Ok((status @ (401 | 403), _)) = &res {
            return Err(ApiError::auth(format!("session rejected (http {status})")));
        }
        let body = expect_success(Vendor::Identity, res)?;
        ["userId", "user_id", "sub"]
            .iter()
            .find_map(|k| body.get(*k).and_then(|v| v.as_str()))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::auth("session has no user"))
    }
}
