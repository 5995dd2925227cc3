//! Retry engine: capped exponential backoff driven by an [`ErrorClassifier`],
//! cancellation between attempts, and metrics emission.

use crate::api::RetryPolicy;
use crate::classify::{ErrorClassifier, Resolved};
use crate::error::{CloudError, ErrorOrigin, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Deterministic delay schedule: `initial, initial * factor, ...`, each value
/// capped at `max`. No jitter. The iterator never ends.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    factor: f64,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            next: initial.min(max),
            max,
            factor,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        // Integer nanos times an integral factor stay exact in f64, so
        // 100ms * 2.0 is exactly 200ms.
        let grown = current.as_nanos() as f64 * self.factor;
        let max_nanos = self.max.as_nanos() as f64;
        self.next = if !grown.is_finite() || grown >= max_nanos {
            self.max
        } else {
            Duration::from_nanos(grown.round() as u64)
        };
        Some(current)
    }
}

/// Runs an operation with retries according to a [`RetryPolicy`].
///
/// Native failures are turned into [`CloudError`]s by the classifier `C`.
/// Non-retryable failures surface after the attempt that produced them;
/// retryable ones are retried until `max_attempts` is reached, after which the
/// last classified error is returned. Each call emits
/// `cloud_operation.duration_seconds` and `cloud_operation.total`, plus one
/// `cloud_operation.retries` increment per scheduled retry.
pub struct RetryExecutor<C> {
    policy: RetryPolicy,
    classifier: C,
    provider: String,
    service: String,
}

impl<C: ErrorClassifier> RetryExecutor<C> {
    pub fn new(
        policy: RetryPolicy,
        classifier: C,
        provider: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            policy,
            classifier,
            provider: provider.into(),
            service: service.into(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Execute `op` until it succeeds, fails permanently, runs out of
    /// attempts, or `cancel` fires between attempts.
    ///
    /// Cancellation is checked before every retry and raced against the
    /// backoff sleep. An attempt already in flight is never interrupted.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, C::Error>>,
    {
        let start = Instant::now();
        let origin = ErrorOrigin::new(&self.provider, &self.service, operation);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut delays = self.policy.backoff();
        let mut attempt: u32 = 1;
        let mut pending_delay: Option<Duration> = None;

        let res = loop {
            if let Some(delay) = pending_delay.take() {
                if cancel.is_cancelled() {
                    tracing::debug!(
                        provider = %self.provider,
                        operation,
                        attempt,
                        "Cancelled before retry"
                    );
                    break Err(CloudError::cancelled(origin.clone()));
                }
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!(
                            provider = %self.provider,
                            operation,
                            attempt,
                            "Cancelled during backoff"
                        );
                        break Err(CloudError::cancelled(origin.clone()));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match op().await {
                Ok(val) => break Ok(val),
                Err(native) => {
                    let Resolved { error, retryable } = self.classifier.resolve(native, &origin);
                    if !retryable {
                        break Err(error);
                    }
                    if attempt >= max_attempts {
                        tracing::error!(
                            provider = %self.provider,
                            service = %self.service,
                            operation,
                            attempts = attempt,
                            error = %error,
                            "Retry attempts exhausted"
                        );
                        break Err(error);
                    }
                    let backoff = delays.next().unwrap_or_else(|| self.policy.max_delay());
                    tracing::warn!(
                        provider = %self.provider,
                        service = %self.service,
                        operation,
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "Retrying cloud operation"
                    );
                    metrics::counter!(
                        "cloud_operation.retries",
                        "provider" => self.provider.clone(),
                        "service" => self.service.clone(),
                        "operation" => operation.to_string()
                    )
                    .increment(1);
                    pending_delay = Some(backoff);
                    attempt += 1;
                }
            }
        };

        let status = if res.is_ok() { "success" } else { "failure" };

        metrics::histogram!(
            "cloud_operation.duration_seconds",
            "provider" => self.provider.clone(),
            "service" => self.service.clone(),
            "operation" => operation.to_string()
        )
        .record(start.elapsed().as_secs_f64());

        metrics::counter!(
            "cloud_operation.total",
            "provider" => self.provider.clone(),
            "service" => self.service.clone(),
            "operation" => operation.to_string(),
            "status" => status
        )
        .increment(1);

        res
    }
}
