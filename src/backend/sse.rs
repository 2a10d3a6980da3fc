//! SSE (Server-Sent Events) decoding for OpenAI-compatible streaming responses.
//!
//! [`SseDecoder`] handles the `data: ` prefix, the `[DONE]` terminator, line
//! buffering across TCP chunk boundaries, and empty keep-alive lines.
//! [`token_stream`] turns a raw byte stream into a [`TokenStream`] of content
//! deltas.

use super::TokenStream;
use crate::error::VersaError;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;

/// One decoded SSE `data:` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    /// A JSON payload.
    Data(Value),
    /// The `data: [DONE]` terminator.
    Done,
}

/// Line-buffered SSE decoder.
///
/// # Example
///
/// ```
/// use versa::backend::sse::{SseDecoder, SseFrame};
///
/// let mut decoder = SseDecoder::new();
/// let data = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: [DONE]\n\n";
/// let frames = decoder.decode(data);
/// assert_eq!(frames.len(), 2);
/// assert_eq!(frames[1], SseFrame::Done);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Create a new empty SSE decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every complete frame.
    ///
    /// Bytes are buffered until a newline arrives, so multi-byte UTF-8
    /// characters split across chunks are decoded intact.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = parse_line(&String::from_utf8_lossy(&line)) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush any trailing line not terminated by a newline.
    pub fn flush(&mut self) -> Vec<SseFrame> {
        let remaining = std::mem::take(&mut self.buffer);
        String::from_utf8_lossy(&remaining)
            .lines()
            .filter_map(parse_line)
            .collect()
    }
}

fn parse_line(line: &str) -> Option<SseFrame> {
    let line = line.trim();
    let data = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))?
        .trim();

    if data == "[DONE]" {
        return Some(SseFrame::Done);
    }
    serde_json::from_str::<Value>(data).ok().map(SseFrame::Data)
}

/// Extract the content delta from a chat-completion chunk, if any.
pub fn delta_content(chunk: &Value) -> Option<&str> {
    chunk
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

struct StreamState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

impl<S> StreamState<S> {
    fn absorb(&mut self, frames: Vec<SseFrame>) -> crate::error::Result<()> {
        for frame in frames {
            if self.finished {
                break;
            }
            match frame {
                SseFrame::Done => self.finished = true,
                SseFrame::Data(chunk) => {
                    if let Some(error) = chunk.get("error") {
                        return Err(VersaError::Upstream {
                            status: 200,
                            body: error.to_string(),
                        });
                    }
                    if let Some(content) = delta_content(&chunk) {
                        self.pending.push_back(content.to_string());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Turn a raw SSE byte stream into a lazy stream of content fragments.
///
/// Bytes are only pulled when the consumer polls. The stream ends at
/// `[DONE]` or when the body ends, whichever comes first; a transport error
/// or an in-band `{"error": ...}` payload ends it with an `Err` item.
pub fn token_stream<S, B, E>(bytes: S) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<VersaError> + Send + 'static,
{
    let state = StreamState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::try_unfold(state, next_token).boxed()
}

async fn next_token<S, B, E>(
    mut state: StreamState<S>,
) -> crate::error::Result<Option<(String, StreamState<S>)>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<VersaError>,
{
    loop {
        if let Some(token) = state.pending.pop_front() {
            return Ok(Some((token, state)));
        }
        if state.finished {
            return Ok(None);
        }
        match state.bytes.next().await {
            Some(chunk) => {
                let chunk = chunk.map_err(Into::<VersaError>::into)?;
                let frames = state.decoder.decode(chunk.as_ref());
                state.absorb(frames)?;
            }
            None => {
                let frames = state.decoder.flush();
                state.absorb(frames)?;
                state.finished = true;
            }
        }
    }
}
