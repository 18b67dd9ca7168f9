use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    ApiKey, CompletionRequest, LlmProvider, Provider, ProviderError, TEMPERATURE, into_success,
    retry::{RetryPolicy, send_with_retry},
};

/// OpenRouter chat completions client.
#[derive(Debug)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: ApiKey,
    base_url: String,
    retry_policy: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    response_format: ResponseFormat,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn into_content(self) -> Option<String> {
        let content = self
            .choices
            .into_iter()
            .next()?
            .message?
            .content?
            .trim()
            .to_string();
        if content.is_empty() { None } else { Some(content) }
    }
}

fn build_request_body<'a>(request: &CompletionRequest<'a>) -> ChatRequest<'a> {
    ChatRequest {
        model: request.model.as_str(),
        temperature: TEMPERATURE,
        response_format: ResponseFormat {
            kind: "json_object",
        },
        messages: [
            ChatMessage {
                role: "system",
                content: request.system_prompt,
            },
            ChatMessage {
                role: "user",
                content: request.user_prompt,
            },
        ],
    }
}

impl OpenRouterClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        api_key: ApiKey,
        base_url: String,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            http,
            api_key,
            base_url,
            retry_policy,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenRouterClient {
    fn provider(&self) -> Provider {
        Provider::OpenRouter
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = build_request_body(request);

        tracing::debug!(model = %request.model, "Sending OpenRouter completion request");

        let outcome = send_with_retry(
            || {
                self.http
                    .post(&url)
                    .bearer_auth(self.api_key.expose_secret())
                    .json(&body)
            },
            &self.retry_policy,
            Provider::OpenRouter.as_str(),
        )
        .await;
        let response = into_success(outcome, Provider::OpenRouter).await?;

        let parsed: ChatResponse = response.json().await.map_err(|source| ProviderError::Decode {
            provider: Provider::OpenRouter,
            source,
        })?;

        parsed.into_content().ok_or(ProviderError::MissingContent {
            provider: Provider::OpenRouter,
        })
    }
}
