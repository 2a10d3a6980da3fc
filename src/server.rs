//! HTTP surface: axum router, SSE framing, CORS and request tracing.

use crate::{
    error::Result,
    history::HistoryEntry,
    service::{GenerateRequest, GenerateResponse, GenerationService, StreamEvent},
};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Terminal SSE payload sent after a streamed generation is persisted.
pub const DONE_SENTINEL: &str = "[DONE]";

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Build the application router.
pub fn router(service: GenerationService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/generate", post(generate))
        .route("/api/generate_stream", post(generate_stream))
        .route("/api/history", get(history))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES)),
        )
        .with_state(service)
}

async fn health() -> &'static str {
    "ok"
}

async fn generate(
    State(service): State<GenerationService>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>> {
    let result = service.generate(request).await?;
    Ok(Json(GenerateResponse { result }))
}

async fn generate_stream(
    State(service): State<GenerationService>,
    Json(request): Json<GenerateRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let events = service.generate_stream(request).await?;
    Ok(Sse::new(events.map(|event| Ok(to_sse_event(event)))))
}

async fn history(State(service): State<GenerationService>) -> Result<Json<Vec<HistoryEntry>>> {
    Ok(Json(service.history().await?))
}

/// Frame a stream event as SSE `data:`: `{"content": ...}` or `[DONE]`.
pub fn to_sse_event(event: StreamEvent) -> Event {
    match event {
        StreamEvent::Content(content) => {
            Event::default().data(json!({ "content": content }).to_string())
        }
        StreamEvent::Done => Event::default().data(DONE_SENTINEL),
    }
}
