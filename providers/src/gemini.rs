use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    ApiKey, CompletionRequest, LlmProvider, ModelName, Provider, ProviderError, TEMPERATURE, into_success,
    retry::{RetryPolicy, send_with_retry},
};

/// Gemini `generateContent` client.
#[derive(Debug)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: ApiKey,
    base_url: Url,
    retry_policy: RetryPolicy,
}

/// Output shape enforced server-side through `responseSchema`.
///
/// Gemini uses an OpenAPI subset with uppercase type names.
fn response_schema() -> Value {
    let string_list = |max_items: u32| {
        json!({
            "type": "ARRAY",
            "maxItems": max_items,
            "items": { "type": "STRING" }
        })
    };
    let bounded_number = json!({ "type": "NUMBER", "minimum": 0, "maximum": 100 });

    json!({
        "type": "OBJECT",
        "required": ["score", "confidence", "pros", "cons", "rationale"],
        "properties": {
            "score": bounded_number,
            "confidence": bounded_number,
            "pros": string_list(10),
            "cons": string_list(10),
            "rationale": { "type": "STRING" },
            "evidence": string_list(5),
            "uncertainty_flags": string_list(5)
        }
    })
}

/// Build the request body for Gemini API.
///
/// Note: Gemini API uses mixed casing:
/// - `system_instruction` (snake_case)
/// - `generationConfig` (camelCase)
/// - `contents` (lowercase)
fn build_request_body(request: &CompletionRequest<'_>) -> Value {
    let mut body = serde_json::Map::new();

    body.insert(
        "contents".into(),
        json!([{
            "role": "user",
            "parts": [{ "text": request.user_prompt }]
        }]),
    );

    if !request.system_prompt.trim().is_empty() {
        body.insert(
            "system_instruction".into(),
            json!({
                "parts": [{ "text": request.system_prompt }]
            }),
        );
    }

    body.insert(
        "generationConfig".into(),
        json!({
            "temperature": TEMPERATURE,
            "responseMimeType": "application/json",
            "responseSchema": response_schema()
        }),
    );

    Value::Object(body)
}

/// `{base}/models/{model}:generateContent`, with the model id encoded as a
/// single path segment.
fn endpoint(base_url: &Url, model: &ModelName) -> Url {
    let mut url = base_url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .push("models")
            .push(&format!("{model}:generateContent"));
    }
    url
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenate the text parts of the first candidate.
    fn into_content(self) -> Option<String> {
        let parts = self.candidates?.into_iter().next()?.content?.parts?;
        let content: String = parts.into_iter().filter_map(|part| part.text).collect();
        let content = content.trim();
        if content.is_empty() {
            None
        } else {
            Some(content.to_string())
        }
    }
}

impl GeminiClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        api_key: ApiKey,
        base_url: Url,
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
impl LlmProvider for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ProviderError> {
        let url = endpoint(&self.base_url, request.model);
        let body = build_request_body(request);

        tracing::debug!(model = %request.model, "Sending Gemini generateContent request");

        let outcome = send_with_retry(
            || {
                self.http
                    .post(url.clone())
                    .header("x-goog-api-key", self.api_key.expose_secret())
                    .json(&body)
            },
            &self.retry_policy,
            Provider::Gemini.as_str(),
        )
        .await;
        let response = into_success(outcome, Provider::Gemini).await?;

        let parsed: GenerateResponse =
            response.json().await.map_err(|source| ProviderError::Decode {
                provider: Provider::Gemini,
                source,
            })?;

        parsed.into_content().ok_or(ProviderError::MissingContent {
            provider: Provider::Gemini,
        })
    }
}
