//! Bounded retries with exponential backoff for transient provider failures.
//!
//! `RetryingProvider` wraps an `LlmProvider` and retries rate limits, 5xx
//! responses, timeouts and connection errors. Anything else (bad key, bad
//! request) fails on the first attempt since it will fail every time.

use std::{sync::Arc, time::Duration};

use {async_trait::async_trait, tracing::warn};

use crate::model::{ChatMessage, CompletionResponse, LlmProvider};

/// How a provider error should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// 429 or quota-style throttling.
    RateLimit,
    /// 5xx / overloaded.
    ServerError,
    /// The request did not finish within the client timeout.
    Timeout,
    /// Connection refused, reset, DNS failure.
    Network,
    /// 401/403.
    AuthError,
    /// 400, bad format.
    InvalidRequest,
    Unknown,
}

impl ProviderErrorKind {
    /// Whether another attempt could plausibly succeed.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::ServerError | Self::Timeout | Self::Network
        )
    }
}

/// Classify an error into a `ProviderErrorKind`.
///
/// Transport errors are recognised by type; HTTP errors by the status text
/// providers embed in their messages.
#[must_use]
pub fn classify_error(err: &anyhow::Error) -> ProviderErrorKind {
    if let Some(e) = err.downcast_ref::<reqwest::Error>() {
        if e.is_timeout() {
            return ProviderErrorKind::Timeout;
        }
        if e.is_connect() || e.is_request() {
            return ProviderErrorKind::Network;
        }
    }

    let msg = err.to_string().to_lowercase();

    if msg.contains("429")
        || msg.contains("rate limit")
        || msg.contains("rate_limit")
        || msg.contains("too many requests")
    {
        return ProviderErrorKind::RateLimit;
    }

    if msg.contains("401")
        || msg.contains("403")
        || msg.contains("unauthorized")
        || msg.contains("forbidden")
        || msg.contains("invalid api key")
        || msg.contains("invalid_api_key")
    {
        return ProviderErrorKind::AuthError;
    }

    if msg.contains("500")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("504")
        || msg.contains("internal server error")
        || msg.contains("bad gateway")
        || msg.contains("service unavailable")
        || msg.contains("overloaded")
    {
        return ProviderErrorKind::ServerError;
    }

    if msg.contains("timed out") || msg.contains("timeout") {
        return ProviderErrorKind::Timeout;
    }

    if msg.contains("connection reset")
        || msg.contains("connection refused")
        || msg.contains("broken pipe")
    {
        return ProviderErrorKind::Network;
    }

    if msg.contains("400") || msg.contains("bad request") || msg.contains("invalid_request") {
        return ProviderErrorKind::InvalidRequest;
    }

    ProviderErrorKind::Unknown
}

/// Extract a `retry_after_ms=<n>` hint left by a provider.
fn retry_after_hint_ms(msg: &str) -> Option<u64> {
    let idx = msg.find("retry_after_ms=")?;
    let digits: String = msg[idx + "retry_after_ms=".len()..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Retry bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): initial * 2^retry, capped.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Provider wrapper that retries transient failures.
///
/// Implements `LlmProvider` itself so callers don't need to know about retries.
pub struct RetryingProvider {
    inner: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LlmProvider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<CompletionResponse> {
        let mut retry = 0;
        loop {
            let err = match self.inner.complete(messages).await {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };

            let kind = classify_error(&err);
            if !kind.is_transient() {
                return Err(err);
            }
            if retry >= self.policy.max_retries {
                return Err(err.context(format!(
                    "provider {} gave up after {} attempts",
                    self.inner.id(),
                    retry + 1
                )));
            }

            let delay = retry_after_hint_ms(&err.to_string())
                .map(Duration::from_millis)
                .unwrap_or_else(|| self.policy.backoff(retry))
                .min(self.policy.max_backoff);
            warn!(
                provider = self.inner.id(),
                error = %err,
                kind = ?kind,
                attempt = retry + 1,
                delay_ms = delay.as_millis() as u64,
                "transient provider error, retrying"
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}
