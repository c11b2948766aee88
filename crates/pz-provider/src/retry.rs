// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Duration;

use rand::Rng;

/// How `start+stream` failures are classified (spec §4.3).
#[derive(Debug, Clone)]
pub enum TransportError {
    /// Worth retrying: timeouts, connection errors, 429, 5xx.
    Transient { msg: String, retry_after_ms: Option<u64> },
    /// Surfaced immediately: auth, bad request, unknown.
    Fatal { msg: String },
}

impl TransportError {
    pub fn message(&self) -> &str {
        match self {
            TransportError::Transient { msg, .. } => msg,
            TransportError::Fatal { msg } => msg,
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub base_ms: u64,
    pub max_ms: u64,
    pub mul: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_tries: 4, base_ms: 2000, max_ms: 60_000, mul: 2 }
    }
}

impl RetryPolicy {
    /// Delay before retry attempt `attempt` (1-indexed), `base_ms * mul^(attempt-1)`
    /// capped at `max_ms`, jittered by ±25%. Honors a server-supplied
    /// `Retry-After` when present instead of the computed backoff.
    pub fn delay(&self, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
        if let Some(ms) = retry_after_ms {
            return Duration::from_millis(ms);
        }
        let exp = self.mul.saturating_pow(attempt.saturating_sub(1));
        let base = self.base_ms.saturating_mul(exp as u64).min(self.max_ms);
        let jitter = rand::rng().random_range(0.75..1.25);
        Duration::from_millis((base as f64 * jitter) as u64)
    }
}

/// Retry `attempt_fn` for transient [`TransportError`]s up to `policy.max_tries`,
/// sleeping between attempts per [`RetryPolicy::delay`]. Fatal errors and the
/// final transient failure propagate immediately.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, mut attempt_fn: F) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 1;
    loop {
        match attempt_fn().await {
            Ok(v) => return Ok(v),
            Err(TransportError::Fatal { msg }) => return Err(TransportError::Fatal { msg }),
            Err(TransportError::Transient { msg, retry_after_ms }) => {
                if attempt >= policy.max_tries {
                    return Err(TransportError::Transient { msg, retry_after_ms });
                }
                tokio::time::sleep(policy.delay(attempt, retry_after_ms)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_caps_at_max_ms() {
        let policy = RetryPolicy { max_tries: 10, base_ms: 2000, max_ms: 10_000, mul: 2 };
        let delay = policy.delay(10, None);
        assert!(delay.as_millis() <= (10_000.0 * 1.25) as u128);
    }

    #[test]
    fn delay_honors_retry_after() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1, Some(500)), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy { max_tries: 4, base_ms: 1, max_ms: 2, mul: 1 };
        let result: Result<&str, TransportError> = retry(policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(TransportError::Transient { msg: "timeout".into(), retry_after_ms: None })
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_never_retry() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let result: Result<(), TransportError> = retry(policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TransportError::Fatal { msg: "bad auth".into() }) }
        })
        .await;
        assert!(matches!(result, Err(TransportError::Fatal { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_max_tries_then_returns_transient() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy { max_tries: 3, base_ms: 1, max_ms: 2, mul: 1 };
        let result: Result<(), TransportError> = retry(policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TransportError::Transient { msg: "5xx".into(), retry_after_ms: None }) }
        })
        .await;
        assert!(matches!(result, Err(TransportError::Transient { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
