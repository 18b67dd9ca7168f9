//! LLM provider clients behind a single completion interface.
//!
//! # Architecture
//!
//! - [`LlmProvider`] - the capability every transport implements: one prompt in,
//!   the model's raw text out
//! - [`openrouter`] - OpenRouter chat completions client
//! - [`gemini`] - Google Gemini `generateContent` client
//! - [`retry`] - timeout, retry budget and backoff policy shared by both
//!
//! Use [`ApiConfig`] to bundle the provider, credential and transport overrides,
//! then [`ApiConfig::build`] to obtain a shareable provider handle.
//!
//! # Error Handling
//!
//! Transport failures surface as [`ProviderError`]. Retryable statuses and
//! network failures are retried inside the provider; what reaches the caller
//! has already exhausted its budget. Callers classify errors with
//! [`ProviderError::kind`].

pub mod retry;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

pub use jury_types::{ApiKey, ModelName, Provider};

/// Canonical OpenRouter API base URL.
pub const OPENROUTER_API_BASE_URL: &str = "https://openrouter.ai/api/v1";
/// Canonical Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Sampling temperature for jury calls; low for stable scoring.
pub(crate) const TEMPERATURE: f64 = 0.2;

const CONNECT_TIMEOUT_SECS: u64 = 10;

const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Build the shared HTTP client used by the providers.
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .build()
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

fn parse_base_url(raw: &str) -> Result<reqwest::Url, ProviderError> {
    let invalid = |reason: String| ProviderError::BaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = reqwest::Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(invalid("expected an http(s) URL".to_string()));
    }
    Ok(url)
}

// ============================================================================
// Errors
// ============================================================================

/// Coarse classification used at the pipeline boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// 401/403: the credential was rejected.
    Authentication,
    /// 429 after the rate-limit budget was exhausted.
    RateLimited,
    /// Connection failure or per-attempt timeout after the generic budget was exhausted.
    Network,
    /// Any other non-2xx status.
    Http,
    /// A 2xx response without usable content.
    MalformedResponse,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("LLM call failed ({status}): {detail}")]
    Http {
        provider: Provider,
        status: u16,
        detail: String,
    },
    #[error("{provider} request failed after {attempts} attempts: {source}")]
    Network {
        provider: Provider,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} response could not be decoded: {source}")]
    Decode {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },
    #[error("LLM response missing message content")]
    MissingContent { provider: Provider },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid provider base URL {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },
}

impl ProviderError {
    /// HTTP status of the final attempt, when there was one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(StatusCode::TOO_MANY_REQUESTS.as_u16())
    }

    #[must_use]
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Http { status: 401 | 403, .. } => ProviderErrorKind::Authentication,
            Self::Http { status: 429, .. } => ProviderErrorKind::RateLimited,
            Self::Http { .. } => ProviderErrorKind::Http,
            Self::Network { .. } | Self::Client(_) | Self::BaseUrl { .. } => {
                ProviderErrorKind::Network
            }
            Self::Decode { .. } | Self::MissingContent { .. } => {
                ProviderErrorKind::MalformedResponse
            }
        }
    }
}

/// Convert a terminal retry outcome into the response or a [`ProviderError`].
pub(crate) async fn into_success(
    outcome: retry::RetryOutcome,
    provider: Provider,
) -> Result<reqwest::Response, ProviderError> {
    match outcome {
        retry::RetryOutcome::Success(response) => Ok(response),
        retry::RetryOutcome::HttpError(response) => {
            let status = response.status().as_u16();
            let detail = read_capped_error_body(response).await;
            Err(ProviderError::Http {
                provider,
                status,
                detail,
            })
        }
        retry::RetryOutcome::ConnectionError { attempts, source } => Err(ProviderError::Network {
            provider,
            attempts,
            source,
        }),
    }
}

// ============================================================================
// Provider capability
// ============================================================================

/// One prompt for one model.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a ModelName,
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
}

/// Trait for LLM transports, enabling substitution in tests.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// Run one completion and return the model's text, trimmed and non-empty.
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ProviderError>;
}

/// Provider selection plus credential and transport overrides.
///
/// ```rust
/// use jury_providers::{ApiConfig, ApiKey, Provider};
///
/// let config = ApiConfig::new(Provider::Gemini, ApiKey::new("test").unwrap())
///     .with_base_url("http://127.0.0.1:9000");
/// assert_eq!(config.base_url(), "http://127.0.0.1:9000");
/// ```
#[derive(Clone)]
pub struct ApiConfig {
    provider: Provider,
    api_key: ApiKey,
    base_url: Option<String>,
    retry_policy: retry::RetryPolicy,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key)
            .field("base_url", &self.base_url())
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    #[must_use]
    pub fn new(provider: Provider, api_key: ApiKey) -> Self {
        Self {
            provider,
            api_key,
            base_url: None,
            retry_policy: retry::RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: retry::RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    #[must_use]
    pub fn provider(&self) -> Provider {
        self.provider
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(match self.provider {
            Provider::OpenRouter => OPENROUTER_API_BASE_URL,
            Provider::Gemini => GEMINI_API_BASE_URL,
        })
    }

    /// Construct the concrete client for the configured provider.
    ///
    /// Fails when the base URL is not an absolute `http(s)` URL.
    pub fn build(&self) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let base_url = parse_base_url(self.base_url())?;
        let client = http_client().map_err(ProviderError::Client)?;
        let provider: Arc<dyn LlmProvider> = match self.provider {
            Provider::OpenRouter => Arc::new(openrouter::OpenRouterClient::new(
                client,
                self.api_key.clone(),
                self.base_url().to_string(),
                self.retry_policy.clone(),
            )),
            Provider::Gemini => Arc::new(gemini::GeminiClient::new(
                client,
                self.api_key.clone(),
                base_url,
                self.retry_policy.clone(),
            )),
        };
        Ok(provider)
    }
}

/// OpenRouter API implementation using the OpenAI-compatible chat completions endpoint.
///
/// Communicates with `{base}/chat/completions`, requesting a JSON object response.
pub mod openrouter;

/// Google Gemini API implementation.
///
/// Communicates with `{base}/models/{model}:generateContent`, constraining the
/// output with a `responseSchema`.
pub mod gemini;
