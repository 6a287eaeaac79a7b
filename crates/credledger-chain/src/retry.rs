//! Backoff for idempotent JSON-RPC requests.
//!
//! A request is repeated when the endpoint cannot be reached or answers
//! with a transient HTTP status (429, 502, 503, 504). A JSON-RPC error
//! object arrives with HTTP 200 and is the node's answer, so it is never
//! repeated. Callers pass [`RetryPolicy::NONE`] for methods that prompt the
//! user or submit transactions.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};

/// Upper bound on a server-requested `Retry-After` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(10);

/// How often and how patiently a read is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Wait before the first retry; doubles on each further retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Send once, never repeat.
    pub const NONE: RetryPolicy = RetryPolicy {
        max_retries: 0,
        base_delay: Duration::ZERO,
    };

    /// Backoff before retry number `attempt + 1`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    /// Three retries at 200ms, 400ms and 800ms.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// Statuses a node or load balancer returns while briefly overloaded or
/// restarting.
pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Send `method` via `send` under `policy`.
///
/// Returns the first non-transient outcome, or the last outcome once the
/// policy is exhausted. A transient status is handed back as the response
/// so the caller can report it.
pub(crate) async fn send_with_retry<F, Fut>(
    method: &str,
    policy: RetryPolicy,
    send: F,
) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let outcome = send().await;
        let (failure, requested_wait) = match &outcome {
            Ok(resp) if is_transient_status(resp.status()) => {
                (format!("HTTP {}", resp.status()), retry_after(resp))
            }
            Ok(_) => return outcome,
            Err(e) if e.is_builder() => return outcome,
            Err(e) => (e.to_string(), None),
        };
        if attempt >= policy.max_retries {
            return outcome;
        }

        let delay = requested_wait.unwrap_or_else(|| policy.delay(attempt));
        attempt += 1;
        tracing::warn!(
            method,
            attempt,
            max_retries = policy.max_retries,
            ?delay,
            error = %failure,
            "transient JSON-RPC failure, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// The wait a 429 asks for, in whole seconds, capped.
fn retry_after(resp: &Response) -> Option<Duration> {
    if resp.status() != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }
    let secs: u64 = resp.headers().get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}
