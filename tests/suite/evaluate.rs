//! End-to-end evaluations against mock provider servers

use std::io::Write;

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jury_engine::config::ConfigFile;
use jury_engine::{
    AgentError, AttestationKey, AttestationSigner, Decision, EvaluationError, Jury, JuryConfig,
    ModelChain, Role, recover_attestor,
};
use jury_providers::ProviderError;
use jury_types::Provider;

use crate::common::{
    KEY_ONE, KEY_ONE_ADDRESS, TEST_API_KEY, agent_json, focus_marker, gemini_body, jury_for,
    legacy_agent_json, model, openrouter_body,
};

async fn mount_openrouter_role(server: &MockServer, role: Role, content: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(focus_marker(role)))
        .respond_with(ResponseTemplate::new(200).set_body_json(openrouter_body(content)))
        .expect(1)
        .mount(server)
        .await;
}

fn openrouter_chain() -> ModelChain {
    ModelChain::new(model("primary-model")).with_fallback(model("fallback-model"))
}

#[tokio::test]
async fn openrouter_evaluation_is_scored_and_attested() {
    let server = MockServer::start().await;
    mount_openrouter_role(&server, Role::Feasibility, &agent_json(80)).await;
    mount_openrouter_role(&server, Role::Innovation, &agent_json(70)).await;
    mount_openrouter_role(&server, Role::RiskEthics, &agent_json(30)).await;

    let signer = AttestationSigner::new(Some(AttestationKey::from_hex(KEY_ONE).unwrap()));
    let jury = jury_for(&server, Provider::OpenRouter, openrouter_chain(), signer);

    let response = jury.evaluate("Peer-to-peer tutoring for rural schools").await.unwrap();

    let scores: Vec<u8> = response.agent_results.iter().map(|a| a.score.get()).collect();
    assert_eq!(scores, vec![80, 70, 30]);
    assert_eq!(response.final_verdict.final_score.get(), 75);
    assert_eq!(response.final_verdict.decision, Decision::Ship);

    let attestation = response.attestation.expect("signing key configured");
    assert_eq!(attestation.attestor, KEY_ONE_ADDRESS);
    assert_eq!(
        recover_attestor(&attestation.message_hash, &attestation.signature).unwrap(),
        KEY_ONE_ADDRESS
    );

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    assert_eq!(
        requests[0].headers["authorization"],
        format!("Bearer {TEST_API_KEY}").as_str()
    );
}

#[tokio::test]
async fn gemini_evaluation_from_config_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", TEST_API_KEY))
        .and(body_string_contains(focus_marker(Role::Innovation)))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(&legacy_agent_json(45))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", TEST_API_KEY))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_body(&format!("```json\n{}\n```", agent_json(40)))),
        )
        .mount(&server)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "[llm]\nprovider = \"gemini\"\napi_key = \"{TEST_API_KEY}\"\nbase_url = \"{}\"\n\n\
         [server]\ninter_agent_delay_ms = 0\n",
        server.uri()
    )
    .unwrap();

    let config =
        JuryConfig::resolve(ConfigFile::read(file.path().to_path_buf()).unwrap(), |_| None)
            .unwrap();
    let jury = Jury::from_config(&config).unwrap();
    assert!(!jury.signer().is_enabled());

    let response = jury.evaluate("Carbon accounting for bakeries").await.unwrap();

    let innovation = &response.agent_results[1];
    assert_eq!(innovation.role, Role::Innovation);
    assert_eq!(innovation.confidence.get(), 50);
    assert_eq!(innovation.uncertainty_flags, vec!["legacy_response_format"]);

    // 0.45*40 + 0.35*45 + 0.20*60 = 45.75
    assert_eq!(response.final_verdict.final_score.get(), 46);
    assert_eq!(response.final_verdict.decision, Decision::Reject);
    assert!(response.attestation.is_none());
}

#[tokio::test]
async fn rate_limited_primary_falls_back_per_role() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("\"model\":\"primary-model\""))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        // Three attempts (two retries) per role.
        .expect(9)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("\"model\":\"fallback-model\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(openrouter_body(&agent_json(60))))
        .expect(3)
        .mount(&server)
        .await;

    let jury = jury_for(
        &server,
        Provider::OpenRouter,
        openrouter_chain(),
        AttestationSigner::disabled(),
    );
    let response = jury.evaluate("Shared EV chargers for apartments").await.unwrap();

    assert_eq!(response.agent_results.len(), 3);
    assert_eq!(response.final_verdict.decision, Decision::Iterate);
}

#[tokio::test]
async fn rate_limit_on_every_model_reports_429() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(6)
        .mount(&server)
        .await;

    let jury = jury_for(
        &server,
        Provider::OpenRouter,
        openrouter_chain(),
        AttestationSigner::disabled(),
    );
    let err = jury.evaluate("idea").await.unwrap_err();

    assert!(matches!(err, EvaluationError::Agent { role: Role::Feasibility, .. }));
    let report = err.report();
    assert_eq!(report.status, 429);
    assert_eq!(report.code, "provider_rate_limited");
}

#[tokio::test]
async fn rejected_credentials_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let jury = jury_for(
        &server,
        Provider::Gemini,
        ModelChain::new(model("gemini-2.0-flash")).with_fallback(model("gemini-2.0-flash-lite")),
        AttestationSigner::disabled(),
    );
    let report = jury.evaluate("idea").await.unwrap_err().report();

    assert_eq!(report.status, 401);
    assert_eq!(report.code, "provider_auth");
    assert_eq!(report.error, "LLM call failed (401) / invalid API key");
}

#[tokio::test]
async fn exhausted_server_errors_fail_without_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        // One attempt plus three retries, primary model only.
        .expect(4)
        .mount(&server)
        .await;

    let jury = jury_for(
        &server,
        Provider::OpenRouter,
        openrouter_chain(),
        AttestationSigner::disabled(),
    );
    let report = jury.evaluate("idea").await.unwrap_err().report();

    assert_eq!(report.status, 500);
    assert_eq!(report.code, "evaluation_failed");
    assert_eq!(report.details.as_deref(), Some("LLM call failed (503): overloaded"));
}

#[tokio::test]
async fn prose_instead_of_json_reports_502() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openrouter_body("I would rate this idea quite highly!")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let jury = jury_for(
        &server,
        Provider::OpenRouter,
        openrouter_chain(),
        AttestationSigner::disabled(),
    );
    let report = jury.evaluate("idea").await.unwrap_err().report();

    assert_eq!(report.status, 502);
    assert_eq!(report.code, "invalid_json");
    assert_eq!(report.error, "Model response is not valid JSON");
}

#[tokio::test]
async fn unreachable_provider_reports_504() {
    // Bind then drop so the port refuses connections.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let uri = format!("http://{addr}");
    let provider = jury_engine::ApiConfig::new(
        Provider::OpenRouter,
        jury_types::ApiKey::new(TEST_API_KEY).unwrap(),
    )
    .with_base_url(uri)
    .with_retry_policy(crate::common::fast_retry_policy())
    .build()
    .unwrap();
    let jury = Jury::new(
        Some(jury_engine::AgentRunner::new(provider, openrouter_chain())),
        AttestationSigner::disabled(),
    );

    let err = jury.evaluate("idea").await.unwrap_err();
    assert!(
        matches!(
            err,
            EvaluationError::Agent {
                role: Role::Feasibility,
                source: AgentError::Provider(ProviderError::Network { attempts: 4, .. }),
            }
        ),
        "unexpected error: {err:?}"
    );
    let report = err.report();
    assert_eq!(report.status, 504);
    assert_eq!(report.code, "provider_unavailable");
}
