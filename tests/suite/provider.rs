//! Provider selection and wire-format tests

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jury_providers::{
    ApiConfig, CompletionRequest, GEMINI_API_BASE_URL, OPENROUTER_API_BASE_URL, ProviderError,
    ProviderErrorKind,
};
use jury_types::{ApiKey, ModelName, Provider};

use crate::common::{TEST_API_KEY, gemini_body, model, openrouter_body, provider_for};

fn request(model: &ModelName) -> CompletionRequest<'_> {
    CompletionRequest {
        model,
        system_prompt: "You are a strict JSON API.",
        user_prompt: "Evaluate this case",
    }
}

#[test]
fn provider_parse_aliases() {
    assert_eq!(Provider::parse("openrouter").unwrap(), Provider::OpenRouter);
    assert_eq!(Provider::parse("OpenRouter").unwrap(), Provider::OpenRouter);
    assert_eq!(Provider::parse("gemini").unwrap(), Provider::Gemini);
    assert_eq!(Provider::parse("google").unwrap(), Provider::Gemini);

    assert!(Provider::parse("claude").is_err());
    assert!(Provider::parse("").is_err());
}

#[test]
fn provider_all_returns_all() {
    let all = Provider::all();
    assert!(all.contains(&Provider::OpenRouter));
    assert!(all.contains(&Provider::Gemini));
    assert_eq!(all.len(), 2);
}

#[test]
fn api_config_defaults_to_public_endpoints() {
    let key = ApiKey::new(TEST_API_KEY).unwrap();
    assert_eq!(
        ApiConfig::new(Provider::OpenRouter, key.clone()).base_url(),
        OPENROUTER_API_BASE_URL
    );
    assert_eq!(ApiConfig::new(Provider::Gemini, key).base_url(), GEMINI_API_BASE_URL);
}

#[test]
fn blank_api_key_is_absent() {
    assert!(ApiKey::new("").is_none());
    assert!(ApiKey::new("   ").is_none());
}

#[tokio::test]
async fn openrouter_sends_json_mode_chat_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "google/gemini-2.0-flash-001",
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": "You are a strict JSON API." },
                { "role": "user", "content": "Evaluate this case" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(openrouter_body("  {\"ok\": 1}  ")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, Provider::OpenRouter);
    assert_eq!(provider.provider(), Provider::OpenRouter);

    let model = model("google/gemini-2.0-flash-001");
    let text = provider.complete(&request(&model)).await.unwrap();
    assert_eq!(text, "{\"ok\": 1}");
}

#[tokio::test]
async fn gemini_sends_schema_constrained_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", TEST_API_KEY))
        .and(body_partial_json(serde_json::json!({
            "system_instruction": { "parts": [{ "text": "You are a strict JSON API." }] },
            "contents": [{ "role": "user", "parts": [{ "text": "Evaluate this case" }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body("{\"ok\": 2}")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, Provider::Gemini);
    let model = model("gemini-2.0-flash");
    let text = provider.complete(&request(&model)).await.unwrap();
    assert_eq!(text, "{\"ok\": 2}");
}

#[tokio::test]
async fn gemini_model_id_is_a_single_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/tunedModels%2Fjury%3Fv%232:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body("{\"ok\": 3}")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, Provider::Gemini);
    let model = model("tunedModels/jury?v#2");
    let text = provider.complete(&request(&model)).await.unwrap();
    assert_eq!(text, "{\"ok\": 3}");
}

#[tokio::test]
async fn empty_choices_are_missing_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
        .mount(&server)
        .await;

    let provider = provider_for(&server, Provider::OpenRouter);
    let model = model("any");
    let err = provider.complete(&request(&model)).await.unwrap_err();

    assert!(matches!(err, ProviderError::MissingContent { .. }));
    assert_eq!(err.kind(), ProviderErrorKind::MalformedResponse);
}

#[tokio::test]
async fn undecodable_envelope_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let provider = provider_for(&server, Provider::Gemini);
    let model = model("gemini-2.0-flash");
    let err = provider.complete(&request(&model)).await.unwrap_err();

    assert!(matches!(err, ProviderError::Decode { provider: Provider::Gemini, .. }));
}

#[tokio::test]
async fn oversized_error_body_is_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("e".repeat(64 * 1024)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, Provider::OpenRouter);
    let model = model("any");
    let err = provider.complete(&request(&model)).await.unwrap_err();

    let ProviderError::Http { status, detail, .. } = &err else {
        panic!("expected HTTP error, got {err:?}");
    };
    assert_eq!(*status, 400);
    assert!(detail.ends_with("...(truncated)"));
    assert!(detail.len() < 40 * 1024);
}
