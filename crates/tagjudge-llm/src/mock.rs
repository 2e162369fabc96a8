//! Deterministic oracle replies for testing
//!
//! Replies come from a responder closure over the request, so tests can
//! script an answer per question prompt. Queued failures are returned
//! first, one per call, to exercise retry paths.

use crate::provider::{LlmError, LlmProvider, LlmResult};
use crate::types::LlmRequest;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

type Responder = dyn Fn(&LlmRequest) -> LlmResult<String> + Send + Sync;

pub struct MockProvider {
    responder: Box<Responder>,
    failures: Mutex<VecDeque<LlmError>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockProvider {
    pub fn from_fn(
        responder: impl Fn(&LlmRequest) -> LlmResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            failures: Mutex::new(VecDeque::new()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with the same text
    pub fn constant(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::from_fn(move |_| Ok(reply.clone()))
    }

    /// Replies consumed in order. Once exhausted, returns a fixed marker text.
    pub fn sequence(replies: Vec<String>) -> Self {
        let next = AtomicUsize::new(0);
        Self::from_fn(move |_| {
            let i = next.fetch_add(1, Ordering::SeqCst);
            Ok(replies
                .get(i)
                .cloned()
                .unwrap_or_else(|| "(mock: sequence exhausted)".into()))
        })
    }

    /// Return these errors, one per call, before the responder is consulted.
    pub fn fail_first(self, errors: Vec<LlmError>) -> Self {
        Self {
            failures: Mutex::new(errors.into()),
            ..self
        }
    }

    /// Sleep before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub async fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn models(&self) -> &[&str] {
        &["mock"]
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<String> {
        self.requests.lock().await.push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.failures.lock().await.pop_front() {
            return Err(err);
        }

        (self.responder)(&request)
    }
}

/// Convenience for tests that need a transient failure value.
pub fn transient_error() -> LlmError {
    LlmError::RateLimited { retry_after_ms: 0 }
}
