//! Retry, timeout and request limiting around any provider

use crate::provider::{LlmError, LlmProvider, LlmResult};
use crate::types::LlmRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Backoff schedule for transient oracle failures
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
    /// Per-attempt timeout.
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 1_000,
            multiplier: 3.0,
            max_backoff_ms: 30_000,
            timeout_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0 = first retry).
    /// A server-provided retry-after wins when it is longer, capped at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32, err: &LlmError) -> Duration {
        let exp = self.base_backoff_ms as f64 * self.multiplier.powi(attempt as i32);
        let mut ms = exp.min(self.max_backoff_ms as f64) as u64;
        if let LlmError::RateLimited { retry_after_ms } = err {
            ms = ms.max(*retry_after_ms).min(self.max_backoff_ms);
        }
        Duration::from_millis(ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

pub struct ResilientProvider {
    inner: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
    permits: Arc<Semaphore>,
}

impl ResilientProvider {
    /// `max_inflight` bounds concurrent requests across every caller sharing this provider.
    pub fn new(inner: Arc<dyn LlmProvider>, policy: RetryPolicy, max_inflight: usize) -> Self {
        Self {
            inner,
            policy,
            permits: Arc::new(Semaphore::new(max_inflight.max(1))),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn attempt(&self, request: LlmRequest) -> LlmResult<String> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        match tokio::time::timeout(self.policy.timeout(), self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                after_ms: self.policy.timeout_ms,
            }),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for ResilientProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn models(&self) -> &[&str] {
        self.inner.models()
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<String> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.attempt(request.clone()).await {
                Ok(reply) => return Ok(reply),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(LlmError::Exhausted {
                            attempts,
                            last: e.to_string(),
                        });
                    }
                    let delay = self.policy.backoff(attempt - 1, &e);
                    warn!(
                        "Transient {} error (attempt {}/{}), retrying in {}ms: {}",
                        self.inner.name(),
                        attempt,
                        attempts,
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                    debug!("Retrying {} request", self.inner.name());
                }
            }
        }
    }
}
