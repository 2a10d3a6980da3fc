//! Request orchestration: mask, prompt, complete, normalize, persist.
//!
//! [`GenerationService`] is the single place where the components meet. It
//! has two entry points: [`generate`](GenerationService::generate) returns the
//! whole normalized result, [`generate_stream`](GenerationService::generate_stream)
//! relays fragments as they arrive and persists once the stream completes.

use crate::{
    backend::{Backend, LlmRequest},
    error::Result,
    history::{HistoryEntry, HistoryStore, NewGeneration},
    masking::mask,
    normalize::normalize,
    prompt::{system_prompt, TaskType},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

const STREAM_CHANNEL_CAPACITY: usize = 128;

/// Inbound request shape shared by both generation endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Task identifier, validated against the catalog.
    pub task_type: String,
    /// The user's text, persisted verbatim.
    pub raw_content: String,
    /// Optional role; only honoured for `WEEKLY_REPORT`.
    #[serde(default)]
    pub role: Option<String>,
}

impl GenerateRequest {
    pub fn new(task_type: impl Into<String>, raw_content: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            raw_content: raw_content.into(),
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Single-response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub result: String,
}

/// One event of a streamed generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of model output, in arrival order.
    Content(String),
    /// The generation finished and was persisted.
    Done,
}

/// Orchestrates generations over a completion backend and a history store.
#[derive(Clone)]
pub struct GenerationService {
    backend: Arc<dyn Backend>,
    store: Arc<dyn HistoryStore>,
    model: String,
}

impl std::fmt::Debug for GenerationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationService")
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .finish()
    }
}

impl GenerationService {
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn HistoryStore>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            store,
            model: model.into(),
        }
    }

    /// Validate the task, mask the input and resolve the prompt.
    ///
    /// Masking applies only to the outbound copy.
    fn prepare(&self, request: &GenerateRequest) -> Result<(TaskType, LlmRequest)> {
        let task = request.task_type.parse::<TaskType>()?;
        let masked = mask(&request.raw_content);
        let prompt = system_prompt(task, request.role.as_deref());
        debug!(
            task_type = %task,
            input_chars = request.raw_content.chars().count(),
            masked = masked != request.raw_content,
            "request prepared"
        );
        Ok((task, LlmRequest::new(&self.model, prompt, masked)))
    }

    /// Run a single-shot generation and return the normalized result.
    ///
    /// Nothing is persisted unless the completion succeeds.
    pub async fn generate(&self, request: GenerateRequest) -> Result<String> {
        let (task, llm_request) = self.prepare(&request)?;
        info!(task_type = %task, backend = self.backend.name(), "generation started");

        let response = self.backend.complete(&llm_request).await?;
        let result = normalize(&response.text);

        self.store
            .append(NewGeneration {
                task_type: task,
                raw_content: request.raw_content,
                generated_result: result.clone(),
            })
            .await?;

        info!(task_type = %task, output_chars = result.chars().count(), "generation finished");
        Ok(result)
    }

    /// Start a streamed generation.
    ///
    /// Validation, prompt resolution and opening the upstream stream happen
    /// before this returns, so those failures surface as errors. After that a
    /// background task relays each fragment as [`StreamEvent::Content`],
    /// persists the accumulated text once the upstream is exhausted, and only
    /// then emits [`StreamEvent::Done`]. An upstream failure mid-stream ends
    /// the sequence without `Done` and without a record.
    ///
    /// The streamed text is persisted as received, without normalization.
    /// The relay keeps running if the receiver is dropped.
    pub async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> Result<ReceiverStream<StreamEvent>> {
        let (task, llm_request) = self.prepare(&request)?;
        info!(task_type = %task, backend = self.backend.name(), "streaming generation started");

        let mut tokens = self.backend.complete_stream(&llm_request).await?;
        let store = Arc::clone(&self.store);
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut full_response = String::new();
            while let Some(item) = tokens.next().await {
                match item {
                    Ok(fragment) => {
                        full_response.push_str(&fragment);
                        if tx.send(StreamEvent::Content(fragment)).await.is_err() {
                            debug!("stream receiver dropped; continuing to accumulate");
                        }
                    }
                    Err(e) => {
                        warn!(task_type = %task, error = %e, "upstream stream failed; nothing persisted");
                        return;
                    }
                }
            }

            let output_chars = full_response.chars().count();
            let persisted = store
                .append(NewGeneration {
                    task_type: task,
                    raw_content: request.raw_content,
                    generated_result: full_response,
                })
                .await;

            match persisted {
                Ok(_) => {
                    info!(task_type = %task, output_chars, "streaming generation finished");
                    let _ = tx.send(StreamEvent::Done).await;
                }
                Err(e) => error!(task_type = %task, error = %e, "failed to persist streamed generation"),
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    /// All persisted generations, newest first, with JSON results decoded.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        let records = self.store.list().await?;
        Ok(records.into_iter().map(HistoryEntry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockReply};
    use crate::error::VersaError;
    use crate::history::SqliteHistoryStore;
    use serde_json::json;

    async fn service_with(backend: Arc<MockBackend>) -> (GenerationService, Arc<SqliteHistoryStore>) {
        let store = Arc::new(SqliteHistoryStore::in_memory().await.unwrap());
        let service = GenerationService::new(backend, store.clone(), "deepseek-chat");
        (service, store)
    }

    #[tokio::test]
    async fn test_meeting_minutes_end_to_end() {
        let backend = Arc::new(MockBackend::fixed("## 【会议主题】：预算\n**张三**下周提交"));
        let (service, store) = service_with(backend.clone()).await;

        let raw = "讨论了预算，张三负责下周提交";
        let result = service
            .generate(GenerateRequest::new("MEETING_MINUTES", raw))
            .await
            .unwrap();
        assert_eq!(result, "【会议主题】：预算\n张三下周提交");

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].raw_content, raw);
        assert_eq!(records[0].generated_result, result);
        assert_eq!(records[0].task_type, TaskType::MeetingMinutes);

        let history = service.history().await.unwrap();
        assert_eq!(history[0].raw_content, raw);

        let sent = backend.requests();
        assert_eq!(sent[0].system_prompt, TaskType::MeetingMinutes.base_prompt());
        assert_eq!(sent[0].model, "deepseek-chat");
        assert_eq!(sent[0].temperature, 0.7);
    }

    #[tokio::test]
    async fn test_email_masked_upstream_but_persisted_raw() {
        let backend = Arc::new(MockBackend::fixed("ok"));
        let (service, store) = service_with(backend.clone()).await;

        let raw = "请联系 test@example.com 或 13812345678";
        service
            .generate(GenerateRequest::new("EMAIL_POLISH", raw))
            .await
            .unwrap();

        let sent = backend.requests();
        assert_eq!(sent[0].user_content, "请联系 t***@example.com 或 138****5678");
        assert!(!sent[0].user_content.contains("test@example.com"));

        let records = store.list().await.unwrap();
        assert_eq!(records[0].raw_content, raw);
        assert!(records[0].raw_content.contains("test@example.com"));
    }

    #[tokio::test]
    async fn test_unknown_task_type_rejected_without_record() {
        let backend = Arc::new(MockBackend::fixed("unused"));
        let (service, store) = service_with(backend.clone()).await;

        let err = service
            .generate(GenerateRequest::new("POEM", "text"))
            .await
            .unwrap_err();
        assert!(matches!(err, VersaError::InvalidTaskType(_)));

        let err = service
            .generate_stream(GenerateRequest::new("POEM", "text"))
            .await
            .unwrap_err();
        assert!(matches!(err, VersaError::InvalidTaskType(_)));

        assert!(store.list().await.unwrap().is_empty());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_weekly_report_role_reaches_prompt() {
        let backend = Arc::new(MockBackend::fixed("ok"));
        let (service, _store) = service_with(backend.clone()).await;

        service
            .generate(GenerateRequest::new("WEEKLY_REPORT", "完成了登录页面").with_role("前端工程师"))
            .await
            .unwrap();
        assert!(backend.requests()[0]
            .system_prompt
            .contains("当前用户角色设定：前端工程师"));
    }

    #[tokio::test]
    async fn test_upstream_failure_persists_nothing() {
        let backend = Arc::new(MockBackend::failing(401, "bad key"));
        let (service, store) = service_with(backend).await;

        let err = service
            .generate(GenerateRequest::new("XHS_STYLE", "text"))
            .await
            .unwrap_err();
        assert!(err.is_upstream());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_wrapped_output_unwrapped() {
        let backend = Arc::new(MockBackend::fixed(r#"{"result": "**plain**"}"#));
        let (service, _store) = service_with(backend).await;
        let result = service
            .generate(GenerateRequest::new("EMAIL_POLISH", "x"))
            .await
            .unwrap();
        assert_eq!(result, "plain");
    }

    #[tokio::test]
    async fn test_stream_relays_fragments_then_done() {
        let backend = Arc::new(MockBackend::fragments(["A", "B", "C"]));
        let (service, store) = service_with(backend).await;

        let events: Vec<StreamEvent> = service
            .generate_stream(GenerateRequest::new("MEETING_MINUTES", "raw"))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Content("A".into()),
                StreamEvent::Content("B".into()),
                StreamEvent::Content("C".into()),
                StreamEvent::Done,
            ]
        );

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].generated_result, "ABC");
        assert_eq!(records[0].raw_content, "raw");
    }

    #[tokio::test]
    async fn test_stream_persists_unnormalized_text() {
        let backend = Arc::new(MockBackend::fragments(["# ", "**x**"]));
        let (service, store) = service_with(backend).await;
        let _: Vec<StreamEvent> = service
            .generate_stream(GenerateRequest::new("XHS_STYLE", "raw"))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(store.list().await.unwrap()[0].generated_result, "# **x**");
    }

    #[tokio::test]
    async fn test_stream_failure_mid_way_has_no_done_and_no_record() {
        let backend = Arc::new(MockBackend::new(vec![MockReply::FailAfter {
            fragments: vec!["A".into(), "B".into()],
            status: 500,
            body: "reset".into(),
        }]));
        let (service, store) = service_with(backend).await;

        let events: Vec<StreamEvent> = service
            .generate_stream(GenerateRequest::new("EMAIL_POLISH", "raw"))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(
            events,
            vec![StreamEvent::Content("A".into()), StreamEvent::Content("B".into())]
        );
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_open_failure_is_error() {
        let backend = Arc::new(MockBackend::failing(503, "busy"));
        let (service, store) = service_with(backend).await;
        let err = service
            .generate_stream(GenerateRequest::new("EMAIL_POLISH", "raw"))
            .await
            .unwrap_err();
        assert!(err.is_upstream());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_persists_after_receiver_dropped() {
        let backend = Arc::new(MockBackend::fragments(["A", "B"]));
        let (service, store) = service_with(backend).await;

        let events = service
            .generate_stream(GenerateRequest::new("EMAIL_POLISH", "raw"))
            .await
            .unwrap();
        drop(events);

        for _ in 0..100 {
            if !store.list().await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(store.list().await.unwrap()[0].generated_result, "AB");
    }

    #[tokio::test]
    async fn test_history_newest_first_with_json_decoding() {
        let backend = Arc::new(MockBackend::new(vec![
            MockReply::Fragments(vec!["first".into()]),
            MockReply::Fragments(vec![r#"{"title": "second"}"#.into()]),
        ]));
        let (service, _store) = service_with(backend).await;

        service
            .generate(GenerateRequest::new("EMAIL_POLISH", "one"))
            .await
            .unwrap();
        service
            .generate(GenerateRequest::new("EMAIL_POLISH", "two"))
            .await
            .unwrap();

        let history = service.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].raw_content, "two");
        assert_eq!(history[0].generated_result, json!({"title": "second"}));
        assert_eq!(history[1].generated_result, json!("first"));
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let request: GenerateRequest = serde_json::from_value(json!({
            "taskType": "WEEKLY_REPORT",
            "rawContent": "text",
            "role": "PM"
        }))
        .unwrap();
        assert_eq!(request.task_type, "WEEKLY_REPORT");
        assert_eq!(request.raw_content, "text");
        assert_eq!(request.role.as_deref(), Some("PM"));

        let request: GenerateRequest =
            serde_json::from_value(json!({"taskType": "XHS_STYLE", "rawContent": "t", "role": null}))
                .unwrap();
        assert!(request.role.is_none());
    }
}
