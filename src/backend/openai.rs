//! Backend for OpenAI-compatible chat-completion APIs.
//!
//! [`OpenAiBackend`] targets DeepSeek by default and works with any provider
//! exposing `POST {base_url}/chat/completions` (OpenAI, vLLM, llama.cpp,
//! LM Studio, Groq, Ollama's `/v1`).
//!
//! Streaming: SSE with `data: {"choices": [{"delta": {"content": "token"}}]}`.

use super::sse::token_stream;
use super::{Backend, LlmRequest, LlmResponse, TokenStream};
use crate::config::LlmSettings;
use crate::error::{Result, VersaError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend for any OpenAI-compatible API.
///
/// # Example
///
/// ```
/// use versa::backend::OpenAiBackend;
///
/// let backend = OpenAiBackend::new(reqwest::Client::new(), "https://api.deepseek.com")
///     .with_api_key("sk-...");
/// assert_eq!(backend.endpoint(), "https://api.deepseek.com/chat/completions");
/// ```
#[derive(Clone)]
pub struct OpenAiBackend {
    client: Client,
    endpoint: String,
    /// Optional API key. If set, sent as `Authorization: Bearer {key}`.
    api_key: Option<String>,
    /// Whole-request limit for single-shot completions. Streams are only
    /// bounded by the client's read timeout between chunks.
    request_timeout: Option<Duration>,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .field(
                "api_key",
                &self.api_key.as_ref().map(|k| match k.get(..6) {
                    Some(prefix) if k.len() > 6 => format!("{}***", prefix),
                    _ => "***".to_string(),
                }),
            )
            .finish()
    }
}

impl OpenAiBackend {
    /// Create a backend without authentication.
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: chat_completions_url(base_url),
            api_key: None,
            request_timeout: None,
        }
    }

    /// Build a backend from startup configuration.
    ///
    /// `settings.timeout` caps a single-shot completion end to end. For
    /// streams it is the longest allowed silence between two chunks, so a
    /// long but healthy generation is never cut off.
    pub fn from_config(settings: &LlmSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(settings.timeout))
            .read_timeout(settings.timeout)
            .build()?;
        let backend = Self::new(client, &settings.base_url).with_request_timeout(settings.timeout);
        Ok(match settings.api_key {
            Some(ref key) => backend.with_api_key(key.clone()),
            None => backend,
        })
    }

    /// Set the API key for authentication.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Bound single-shot completions by `timeout` from send to last byte.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Returns `true` if an API key has been configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The full chat-completions URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the request body for `/chat/completions`.
    fn build_body(request: &LlmRequest, stream: bool) -> Value {
        json!({
            "model": request.model,
            "messages": request.messages(),
            "temperature": request.temperature,
            "stream": stream,
        })
    }

    /// Send the request and turn non-success statuses into [`VersaError::Upstream`].
    async fn send(&self, body: &Value, stream: bool) -> Result<reqwest::Response> {
        let mut req = self.client.post(&self.endpoint).json(body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        if let (false, Some(timeout)) = (stream, self.request_timeout) {
            req = req.timeout(timeout);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VersaError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Extract metadata from a completion response.
    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let meta: serde_json::Map<String, Value> = ["usage", "model", "id"]
            .into_iter()
            .filter_map(|key| json_resp.get(key).map(|v| (key.to_string(), v.clone())))
            .collect();
        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = Self::build_body(request, false);
        let resp = self.send(&body, false).await?;
        let status = resp.status().as_u16();
        let json_resp: Value = serde_json::from_slice(&resp.bytes().await?)?;

        let text = json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| VersaError::Upstream {
                status,
                body: "response has no choices[0].message.content".to_string(),
            })?
            .to_string();

        let metadata = Self::extract_metadata(&json_resp);
        debug!(status, chars = text.chars().count(), ?metadata, "completion received");

        Ok(LlmResponse {
            text,
            status,
            metadata,
        })
    }

    async fn complete_stream(&self, request: &LlmRequest) -> Result<TokenStream> {
        let body = Self::build_body(request, true);
        let resp = self.send(&body, true).await?;
        debug!(status = resp.status().as_u16(), "completion stream opened");
        Ok(token_stream(resp.bytes_stream()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Derive the chat-completions URL from a provider base URL.
///
/// Accepts both bare bases (`https://api.deepseek.com`, `https://api.openai.com/v1`)
/// and full endpoint URLs.
pub fn chat_completions_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.ends_with(CHAT_COMPLETIONS_PATH) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, CHAT_COMPLETIONS_PATH)
    }
}
