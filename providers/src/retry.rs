//! HTTP retry policy with exponential backoff.
//!
//! # Retry Policy
//!
//! - Per-attempt timeout: 15 seconds
//! - Generic budget: 3 retries, delay doubling from 500ms
//! - Rate-limit budget (HTTP 429): 2 retries, delay doubling from 2s, capped at 30s
//! - `Retry-After` (seconds) on a 429 replaces the computed delay, capped at 60s
//!
//! The two budgets are counted independently: a 429 never consumes a generic
//! retry and vice versa.
//!
//! # Retryable Conditions
//!
//! - HTTP 408, 429, 500, 502, 503, 504
//! - Connection errors and per-attempt timeouts (generic budget)

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, header::HeaderMap};

/// Retry configuration. [`Default`] is the production policy.
///
/// The generic and rate-limit budgets are separate, so a sustained 5xx gets
/// four attempts while a sustained 429 gets three. This departs on purpose
/// from a single loop that caps every status at three attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Timeout applied to every individual attempt.
    pub request_timeout: Duration,
    /// Retries allowed for retryable statuses other than 429 and for network failures.
    pub max_retries: u32,
    /// Retries allowed for HTTP 429.
    pub max_rate_limit_retries: u32,
    /// Initial delay for the generic budget.
    pub initial_delay: Duration,
    /// Initial delay for the rate-limit budget.
    pub rate_limit_initial_delay: Duration,
    /// Ceiling for computed rate-limit delays.
    pub rate_limit_max_delay: Duration,
    /// Ceiling for server-supplied `Retry-After` hints.
    pub retry_after_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            max_retries: 3,
            max_rate_limit_retries: 2,
            initial_delay: Duration::from_millis(500),
            rate_limit_initial_delay: Duration::from_secs(2),
            rate_limit_max_delay: Duration::from_secs(30),
            retry_after_cap: Duration::from_secs(60),
        }
    }
}

/// Which budget a failure draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Generic,
    RateLimited,
}

impl RetryClass {
    #[must_use]
    pub fn for_status(status: StatusCode) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited
        } else {
            Self::Generic
        }
    }
}

/// Retries consumed so far, per class.
#[derive(Debug, Default, Clone, Copy)]
struct RetryBudget {
    generic: u32,
    rate_limited: u32,
}

impl RetryBudget {
    /// Consume one retry of `class`. Returns the backoff step (0 for the first
    /// retry of that class), or `None` when the class is exhausted.
    fn take(&mut self, class: RetryClass, policy: &RetryPolicy) -> Option<u32> {
        let (used, limit) = match class {
            RetryClass::Generic => (&mut self.generic, policy.max_retries),
            RetryClass::RateLimited => (&mut self.rate_limited, policy.max_rate_limit_retries),
        };
        if *used >= limit {
            return None;
        }
        let step = *used;
        *used += 1;
        Some(step)
    }
}

/// Determine if a response status is retryable.
#[must_use]
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}

/// Parse a `Retry-After` header given in (possibly fractional) seconds.
///
/// Returns `None` if the header is missing, unparsable, non-finite or not
/// positive. Valid hints are capped at `cap`.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap, cap: Duration) -> Option<Duration> {
    let secs = headers
        .get("retry-after")?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()?;
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(secs.min(cap.as_secs_f64())))
}

/// Calculate the delay before the next attempt.
///
/// - `backoff_step`: 0 before the first retry of `class`, 1 before the second, etc.
/// - `headers` are only consulted for rate-limited responses.
#[must_use]
pub fn calculate_retry_delay(
    class: RetryClass,
    backoff_step: u32,
    policy: &RetryPolicy,
    headers: Option<&HeaderMap>,
) -> Duration {
    let factor = 2_u32.saturating_pow(backoff_step);
    match class {
        RetryClass::RateLimited => {
            if let Some(headers) = headers
                && let Some(delay) = parse_retry_after(headers, policy.retry_after_cap)
            {
                return delay;
            }
            policy
                .rate_limit_initial_delay
                .saturating_mul(factor)
                .min(policy.rate_limit_max_delay)
        }
        RetryClass::Generic => policy.initial_delay.saturating_mul(factor),
    }
}

/// Outcome of a retry operation.
///
/// This is a sum type that structurally distinguishes success from failure,
/// ensuring callers cannot accidentally treat an error response as success.
#[derive(Debug)]
pub enum RetryOutcome {
    /// Request succeeded (2xx status).
    Success(Response),
    /// Non-2xx response that was not retryable or exhausted its budget.
    /// The response is provided for error body inspection.
    HttpError(Response),
    /// Transport failure (connect error, timeout) that was not retryable or
    /// exhausted the generic budget.
    ConnectionError {
        attempts: u32,
        source: reqwest::Error,
    },
}

impl RetryOutcome {
    /// Returns true if this is a successful response.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Send a request with automatic retries.
///
/// `build_request` is called once per attempt; the policy's per-attempt
/// timeout is applied to each request it returns. Every retry is logged with
/// the status (or error), the attempt number and the chosen delay.
pub async fn send_with_retry<F>(build_request: F, policy: &RetryPolicy, label: &str) -> RetryOutcome
where
    F: Fn() -> RequestBuilder,
{
    let mut budget = RetryBudget::default();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let request = build_request().timeout(policy.request_timeout);

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return RetryOutcome::Success(response);
                }
                if !is_retryable_status(status) {
                    return RetryOutcome::HttpError(response);
                }

                let class = RetryClass::for_status(status);
                let Some(step) = budget.take(class, policy) else {
                    return RetryOutcome::HttpError(response);
                };
                let delay = calculate_retry_delay(class, step, policy, Some(response.headers()));
                tracing::warn!(
                    provider = label,
                    status = status.as_u16(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying request after error status"
                );
                drop(response);
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if !is_retryable_error(&e) {
                    return RetryOutcome::ConnectionError {
                        attempts: attempt,
                        source: e,
                    };
                }
                let Some(step) = budget.take(RetryClass::Generic, policy) else {
                    return RetryOutcome::ConnectionError {
                        attempts: attempt,
                        source: e,
                    };
                };
                let delay = calculate_retry_delay(RetryClass::Generic, step, policy, None);
                tracing::warn!(
                    provider = label,
                    error = %e,
                    timeout = e.is_timeout(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying request after connection error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}
