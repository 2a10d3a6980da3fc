//! # Versa
//!
//! Persona rewriting backend: takes raw text plus a task type, masks personal
//! data, asks an OpenAI-compatible chat completion provider to rewrite it in
//! the requested register, cleans up the reply and keeps an append-only
//! history of every generation.
//!
//! ## Core Concepts
//!
//! - **[`TaskType`]**: the closed set of rewriting styles, each with a fixed
//!   system prompt (see [`prompt`]).
//! - **[`mask`]**: redacts emails and phone-like digit runs before any text
//!   leaves the process.
//! - **[`Backend`]**: object-safe trait for completion providers, with a
//!   single-shot and a streaming call. [`OpenAiBackend`] talks HTTP,
//!   [`MockBackend`] replays scripted replies.
//! - **[`normalize`]**: strips markdown headings and bold markers and unwraps
//!   `{"result": ...}` envelopes from model output.
//! - **[`HistoryStore`]**: persistence seam; [`SqliteHistoryStore`] is the
//!   sqlx implementation.
//! - **[`GenerationService`]**: the request handler tying these together.
//! - **[`server::router`]**: the axum HTTP surface.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use versa::{GenerateRequest, GenerationService, MockBackend, SqliteHistoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteHistoryStore::in_memory().await?);
//!     let backend = Arc::new(MockBackend::fixed("## 【会议主题】：预算"));
//!     let service = GenerationService::new(backend, store, "deepseek-chat");
//!
//!     let result = service
//!         .generate(GenerateRequest::new("MEETING_MINUTES", "讨论了预算"))
//!         .await?;
//!     assert_eq!(result, "【会议主题】：预算");
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod history;
pub mod masking;
pub mod normalize;
pub mod prompt;
pub mod server;
pub mod service;

pub use backend::{Backend, LlmRequest, LlmResponse, MockBackend, MockReply, OpenAiBackend};
pub use config::Config;
pub use error::{Result, VersaError};
pub use history::{GenerationRecord, HistoryEntry, HistoryStore, NewGeneration, SqliteHistoryStore};
pub use masking::mask;
pub use normalize::normalize;
pub use prompt::{system_prompt, TaskType};
pub use service::{GenerateRequest, GenerateResponse, GenerationService, StreamEvent};
