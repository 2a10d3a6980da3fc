//! Completion client adapter: backend trait and normalized request/response types.
//!
//! The [`Backend`] trait abstracts over chat-completion providers. Every
//! request is a fixed two-message exchange (system prompt + user content).
//! Built-in implementations: [`OpenAiBackend`] for any OpenAI-compatible API
//! (DeepSeek by default) and [`MockBackend`] for tests.
//!
//! ## Architecture
//!
//! ```text
//! GenerationService ──► LlmRequest ──► Backend::complete()        ──► LlmResponse
//!                                  └─► Backend::complete_stream() ──► TokenStream
//!                                               │
//!                                      OpenAiBackend
//!                                      /chat/completions
//!                                      SSE streaming
//! ```
//!
//! Upstream failures are returned as-is. There is no retry layer.

pub mod mock;
pub mod openai;
pub mod sse;

pub use mock::{MockBackend, MockReply};
pub use openai::OpenAiBackend;

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

/// Sampling temperature used for every generation.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// A lazy, finite, non-restartable sequence of text fragments.
///
/// Yields fragments in arrival order. An `Err` item means the upstream stream
/// broke; consumers should stop reading at that point.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// A normalized chat-completion request, provider-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"deepseek-chat"`).
    pub model: String,
    /// System prompt establishing the persona.
    pub system_prompt: String,
    /// User content, already masked.
    pub user_content: String,
    /// Sampling temperature.
    pub temperature: f64,
}

impl LlmRequest {
    /// Build a request at the default temperature.
    pub fn new(
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        user_content: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            user_content: user_content.into(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// The two messages sent to the provider, system first.
    pub fn messages(&self) -> [ChatMessage<'_>; 2] {
        [
            ChatMessage {
                role: Role::System,
                content: &self.system_prompt,
            },
            ChatMessage {
                role: Role::User,
                content: &self.user_content,
            },
        ]
    }
}

/// A single message in a chat exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChatMessage<'a> {
    /// The role of the message author.
    pub role: Role,
    /// The message content.
    pub content: &'a str,
}

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
}

/// A normalized completion response.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated text content.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (token usage, model, response id).
    pub metadata: Option<serde_json::Value>,
}

/// Abstraction over chat-completion providers.
///
/// Object-safe; the service holds it as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a single-shot completion and return the whole text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Open a streaming completion.
    ///
    /// Connection and status errors surface here; errors after the stream
    /// has started arrive as `Err` items of the returned [`TokenStream`].
    async fn complete_stream(&self, request: &LlmRequest) -> Result<TokenStream>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_temperature() {
        let request = LlmRequest::new("deepseek-chat", "sys", "user");
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.model, "deepseek-chat");
    }

    #[test]
    fn test_messages_are_system_then_user() {
        let request = LlmRequest::new("m", "be terse", "hello");
        let [system, user] = request.messages();
        assert_eq!(system.role, Role::System);
        assert_eq!(system.content, "be terse");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "hello");
    }

    #[test]
    fn test_message_serialization() {
        let request = LlmRequest::new("m", "s", "u");
        let json = serde_json::to_value(request.messages()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "system", "content": "s"},
                {"role": "user", "content": "u"}
            ])
        );
    }
}
