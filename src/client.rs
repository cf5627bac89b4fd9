use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ActionError;

pub const API_KEY_HEADER: &str = "X-API-KEY";

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "DELETE")]
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call as a handler describes it: method, path relative to the base URL,
/// optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ActionRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::Get, path: path.into(), body: None }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self { method: Method::Delete, path: path.into(), body: None }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self { method: Method::Post, path: path.into(), body: Some(body) }
    }
}

/// Fully resolved request handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    #[cfg(test)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw text of whatever the server sent back.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub text: String,
}

/// Response body: parsed JSON when possible, the raw text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    /// Empty bodies become `{}`; unparseable ones are kept verbatim.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return ResponseBody::Json(Value::Object(Default::default()));
        }
        match serde_json::from_str(raw) {
            Ok(v) => ResponseBody::Json(v),
            Err(_) => ResponseBody::Text(raw.to_string()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            ResponseBody::Text(_) => None,
        }
    }

    /// Non-empty `stack_id` string at the top level of a JSON body.
    pub fn stack_id(&self) -> Option<String> {
        self.as_json()?
            .get("stack_id")?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponsePayload {
    pub method: Method,
    pub url: String,
    pub status: u16,
    pub ok: bool,
    pub body: ResponseBody,
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// Executes one resolved request. Implementations fail only when no HTTP
/// response was obtained at all.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<RawResponse, ActionError>>;
}

pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { http: reqwest::Client::new() }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<RawResponse, ActionError>> {
        Box::pin(async move {
            let method = match request.method {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
                Method::Delete => reqwest::Method::DELETE,
            };
            let mut req = self.http.request(method, &request.url);
            for (name, value) in &request.headers {
                req = req.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                req = req.body(body);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| ActionError::Transport(format!("request to {} failed: {e}", request.url)))?;
            let status = resp.status().as_u16();
            let text = resp
                .text()
                .await
                .map_err(|e| ActionError::Transport(format!("reading response from {} failed: {e}", request.url)))?;
            Ok(RawResponse { status, text })
        })
    }
}

// ── Connection settings ───────────────────────────────────────────────────────

/// Snapshot of everything a request needs besides the call itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ConnectionSettings {
    /// `base_override` wins when non-blank; `origin` is the configured fallback.
    /// The key is kept only when enabled and non-blank.
    pub fn new(base_override: &str, origin: &str, api_key: &str, api_key_enabled: bool) -> Self {
        let key = api_key.trim();
        Self {
            base_url: resolve_base_url(base_override, origin),
            api_key: (api_key_enabled && !key.is_empty()).then(|| key.to_string()),
        }
    }
}

/// Trimmed override without trailing slashes, or the origin when the override
/// is blank.
pub fn resolve_base_url(base_override: &str, origin: &str) -> String {
    let raw = base_override.trim();
    let chosen = if raw.is_empty() { origin.trim() } else { raw };
    chosen.trim_end_matches('/').to_string()
}

/// Join so that exactly one `/` separates base and path.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

// ── RequestPipeline ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    settings: ConnectionSettings,
}

impl RequestPipeline {
    pub fn new(transport: Arc<dyn Transport>, settings: ConnectionSettings) -> Self {
        Self { transport, settings }
    }

    pub fn build(&self, request: &ActionRequest) -> Result<HttpRequest, ActionError> {
        let url = join_url(&self.settings.base_url, &request.path);
        let mut headers = Vec::new();
        if let Some(key) = &self.settings.api_key {
            headers.push((API_KEY_HEADER.to_string(), key.clone()));
        }
        let body = match &request.body {
            Some(value) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                let encoded = serde_json::to_string(value)
                    .map_err(|e| ActionError::Internal(format!("encoding request body: {e}")))?;
                Some(encoded)
            }
            None => None,
        };
        Ok(HttpRequest { method: request.method, url, headers, body })
    }

    /// Perform one call. Any HTTP response yields a payload; non-2xx ones come
    /// back as [`ActionError::Response`] carrying that payload.
    pub async fn perform(&self, request: ActionRequest) -> Result<ResponsePayload, ActionError> {
        let http = self.build(&request)?;
        let method = http.method;
        let url = http.url.clone();
        debug!(%method, %url, authenticated = self.settings.api_key.is_some(), "sending request");

        let raw = self.transport.send(http).await?;
        let ok = (200..300).contains(&raw.status);
        debug!(%method, %url, status = raw.status, "response received");

        let payload = ResponsePayload {
            method,
            url,
            status: raw.status,
            ok,
            body: ResponseBody::parse(&raw.text),
        };
        if ok {
            Ok(payload)
        } else {
            Err(ActionError::Response(Box::new(payload)))
        }
    }
}

// ── Scripted transport for tests ──────────────────────────────────────────────
