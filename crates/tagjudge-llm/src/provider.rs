//! LLM Provider trait

use crate::types::LlmRequest;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl LlmError {
    /// Errors worth retrying: rate limiting, server-side failures, timeouts and
    /// connection trouble. Everything else fails the call immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. }
                | LlmError::ServerError { .. }
                | LlmError::Timeout { .. }
                | LlmError::StreamError(_)
                | LlmError::NetworkError(_)
        )
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, body: String, retry_after_ms: Option<u64>) -> Self {
        match status {
            401 | 403 => LlmError::AuthFailed(body),
            429 => LlmError::RateLimited {
                retry_after_ms: retry_after_ms.unwrap_or(60_000),
            },
            s if s >= 500 => LlmError::ServerError { status: s, body },
            s => LlmError::RequestFailed(format!("{}: {}", s, body)),
        }
    }
}

/// A text-understanding oracle: ordered role-tagged turns in, one free-text reply out.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn models(&self) -> &[&str];

    fn supports_model(&self, model: &str) -> bool {
        self.models()
            .iter()
            .any(|m| *m == model || model.starts_with(m))
    }

    /// Send the conversation and wait for the complete reply.
    async fn complete(&self, request: LlmRequest) -> LlmResult<String>;
}

/// Parse a `retry-after` header value given in seconds.
pub(crate) fn retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|secs| (secs * 1000.0) as u64)
}
