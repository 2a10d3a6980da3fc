//! Mock backend for testing without a live provider.
//!
//! [`MockBackend`] replays scripted replies in order and records every
//! request it receives, so tests can assert on what would have been sent
//! upstream (e.g. that PII was masked).
//!
//! # Example
//!
//! ```
//! use versa::backend::MockBackend;
//!
//! let mock = MockBackend::fragments(["A", "B", "C"]);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;

use super::{Backend, LlmRequest, LlmResponse, TokenStream};
use crate::error::{Result, VersaError};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Completes with these fragments (joined for single-shot calls).
    Fragments(Vec<String>),
    /// Fails before any output with the given status and body.
    Fail { status: u16, body: String },
    /// Streams the fragments, then breaks with an upstream error.
    /// Single-shot calls fail immediately.
    FailAfter {
        fragments: Vec<String>,
        status: u16,
        body: String,
    },
}

/// A test backend that returns canned replies in order.
///
/// Cycles back to the beginning when all replies have been consumed.
#[derive(Debug)]
pub struct MockBackend {
    replies: Vec<MockReply>,
    index: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockBackend {
    /// Create a mock backend with the given scripted replies.
    pub fn new(replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "MockBackend requires at least one reply");
        Self {
            replies,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A mock that always returns the same text (streamed as one fragment).
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(vec![MockReply::Fragments(vec![text.into()])])
    }

    /// A mock that always streams the given fragments.
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(vec![MockReply::Fragments(
            fragments.into_iter().map(Into::into).collect(),
        )])
    }

    /// A mock that always fails with the given status.
    pub fn failing(status: u16, body: impl Into<String>) -> Self {
        Self::new(vec![MockReply::Fail {
            status,
            body: body.into(),
        }])
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self, request: &LlmRequest) -> MockReply {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.replies.len();
        self.replies[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        match self.next_reply(request) {
            MockReply::Fragments(fragments) => Ok(LlmResponse {
                text: fragments.concat(),
                status: 200,
                metadata: None,
            }),
            MockReply::Fail { status, body } | MockReply::FailAfter { status, body, .. } => {
                Err(VersaError::Upstream { status, body })
            }
        }
    }

    async fn complete_stream(&self, request: &LlmRequest) -> Result<TokenStream> {
        match self.next_reply(request) {
            MockReply::Fragments(fragments) => {
                Ok(futures::stream::iter(fragments.into_iter().map(Ok)).boxed())
            }
            MockReply::Fail { status, body } => Err(VersaError::Upstream { status, body }),
            MockReply::FailAfter {
                fragments,
                status,
                body,
            } => {
                let items = fragments
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(VersaError::Upstream { status, body })));
                Ok(futures::stream::iter(items).boxed())
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn request() -> LlmRequest {
        LlmRequest::new("test", "sys", "user")
    }

    #[tokio::test]
    async fn test_mock_fixed_response() {
        let mock = MockBackend::fixed("Hello!");
        let resp = mock.complete(&request()).await.unwrap();
        assert_eq!(resp.text, "Hello!");
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn test_mock_cycles_replies() {
        let mock = MockBackend::new(vec![
            MockReply::Fragments(vec!["first".into()]),
            MockReply::Fragments(vec!["second".into()]),
        ]);
        let r1 = mock.complete(&request()).await.unwrap();
        let r2 = mock.complete(&request()).await.unwrap();
        let r3 = mock.complete(&request()).await.unwrap();
        assert_eq!(r1.text, "first");
        assert_eq!(r2.text, "second");
        assert_eq!(r3.text, "first");
    }

    #[tokio::test]
    async fn test_mock_streaming_fragments() {
        let mock = MockBackend::fragments(["A", "B", "C"]);
        let tokens: Vec<String> = mock
            .complete_stream(&request())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(tokens, vec!["A", "B", "C"]);
        assert_eq!(mock.complete(&request()).await.unwrap().text, "ABC");
    }

    #[tokio::test]
    async fn test_mock_failures() {
        let mock = MockBackend::failing(503, "busy");
        assert!(mock.complete(&request()).await.is_err());
        assert!(mock.complete_stream(&request()).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_fail_after() {
        let mock = MockBackend::new(vec![MockReply::FailAfter {
            fragments: vec!["A".into()],
            status: 500,
            body: "boom".into(),
        }]);
        let mut stream = mock.complete_stream(&request()).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "A");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_mock_records_requests() {
        let mock = MockBackend::fixed("ok");
        mock.complete(&LlmRequest::new("m", "s", "first")).await.unwrap();
        let _stream = mock
            .complete_stream(&LlmRequest::new("m", "s", "second"))
            .await
            .unwrap();
        let seen: Vec<String> = mock.requests().into_iter().map(|r| r.user_content).collect();
        assert_eq!(seen, vec!["first", "second"]);
    }
}
