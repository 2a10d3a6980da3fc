use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors produced by the service and its components.
#[derive(Error, Debug)]
pub enum VersaError {
    /// The requested task type is not in the prompt catalog.
    #[error("Invalid taskType")]
    InvalidTaskType(String),

    /// The completion provider answered with a non-success status code.
    #[error("Upstream HTTP {status}: {body}")]
    Upstream {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("Upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a payload that is not valid JSON.
    #[error("Upstream payload malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage failure while reading or writing history.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed at startup.
    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Invalid configuration detected at startup.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl VersaError {
    /// Whether the failure originated at the completion provider.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            VersaError::Upstream { .. } | VersaError::Request(_) | VersaError::Json(_)
        )
    }

    /// HTTP status this error maps to when surfaced to a caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            VersaError::InvalidTaskType(_) => StatusCode::BAD_REQUEST,
            VersaError::Upstream { .. } | VersaError::Request(_) | VersaError::Json(_) => {
                StatusCode::BAD_GATEWAY
            }
            VersaError::Database(_) | VersaError::Migrate(_) | VersaError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to return to a caller.
    ///
    /// Provider bodies, transport details and storage errors stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            VersaError::InvalidTaskType(_) => self.to_string(),
            VersaError::Upstream { status, .. } => {
                format!("Upstream provider returned HTTP {status}")
            }
            VersaError::Request(_) => "Upstream provider unreachable".to_string(),
            VersaError::Json(_) => "Upstream provider returned a malformed response".to_string(),
            VersaError::Database(_) | VersaError::Migrate(_) | VersaError::Config(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for VersaError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(json!({ "detail": self.client_message() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, VersaError>;
