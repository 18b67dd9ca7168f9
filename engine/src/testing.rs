//! In-memory provider fake for runner and pipeline tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;

use jury_providers::{CompletionRequest, LlmProvider, Provider, ProviderError};

pub(crate) const VALID_RESPONSE: &str = r#"{
    "score": 70,
    "confidence": 80,
    "pros": ["clear user"],
    "cons": ["crowded market"],
    "rationale": "Plausible with a narrow first release."
}"#;

pub(crate) fn scored_response(score: u8) -> String {
    format!(
        r#"{{"score": {score}, "confidence": 60, "pros": [], "cons": [], "rationale": "ok"}}"#
    )
}

pub(crate) fn http_error(status: u16) -> ProviderError {
    ProviderError::Http {
        provider: Provider::OpenRouter,
        status,
        detail: format!("status {status}"),
    }
}

struct RecordedRequest {
    model: String,
    user_prompt: String,
    at: Instant,
}

/// Replays a fixed script of completion results and records each request.
pub(crate) struct ScriptedProvider {
    provider: Provider,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedProvider {
    pub(crate) fn new(
        provider: Provider,
        script: Vec<Result<String, ProviderError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn models_requested(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.model.clone())
            .collect()
    }

    pub(crate) fn user_prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.user_prompt.clone())
            .collect()
    }

    /// Clock reading at each call, in call order.
    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.at)
            .collect()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            model: request.model.as_str().to_string(),
            user_prompt: request.user_prompt.to_string(),
            at: Instant::now(),
        });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ProviderError::MissingContent {
                provider: self.provider,
            }))
    }
}
