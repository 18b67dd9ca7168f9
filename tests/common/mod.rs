//! Shared test utilities and fixtures
//!
//! Mock provider servers and jury construction for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::MockServer;

use jury_engine::{AgentRunner, ApiConfig, AttestationSigner, Jury, ModelChain};
use jury_providers::LlmProvider;
use jury_providers::retry::RetryPolicy;
use jury_types::{ApiKey, ModelName, Provider, Role};

pub const TEST_API_KEY: &str = "test-key";

/// Secret key 1; its address is a well-known test vector.
pub const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
pub const KEY_ONE_ADDRESS: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

/// Retry policy with millisecond delays so exhaustion tests stay fast.
pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        request_timeout: Duration::from_secs(5),
        initial_delay: Duration::from_millis(1),
        rate_limit_initial_delay: Duration::from_millis(1),
        rate_limit_max_delay: Duration::from_millis(5),
        ..RetryPolicy::default()
    }
}

/// Text a well-behaved model returns for the current contract.
pub fn agent_json(score: u8) -> String {
    json!({
        "score": score,
        "confidence": 70,
        "score_breakdown": { "primary": score, "secondary": score, "tertiary": score },
        "pros": ["focused scope"],
        "cons": ["unproven demand"],
        "rationale": format!("Scored {score} after weighing the trade-offs."),
        "evidence": [],
        "uncertainty_flags": []
    })
    .to_string()
}

/// Text an older prompt/model version returns.
pub fn legacy_agent_json(score: u8) -> String {
    json!({
        "score": score,
        "pros": ["simple"],
        "cons": ["narrow"],
        "rationale": "Legacy shaped answer."
    })
    .to_string()
}

pub fn openrouter_body(content: &str) -> Value {
    json!({
        "id": "gen-test",
        "model": "google/gemini-2.0-flash-001",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

pub fn gemini_body(content: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": content }] },
            "finishReason": "STOP"
        }]
    })
}

/// A distinctive substring of the prompt sent for `role`.
pub fn focus_marker(role: Role) -> &'static str {
    match role {
        Role::Feasibility => "implementation realism",
        Role::Innovation => "market differentiation",
        Role::RiskEthics => "Higher score means higher risk",
    }
}

pub fn model(name: &str) -> ModelName {
    ModelName::parse(name).unwrap()
}

pub fn provider_for(server: &MockServer, provider: Provider) -> Arc<dyn LlmProvider> {
    ApiConfig::new(provider, ApiKey::new(TEST_API_KEY).unwrap())
        .with_base_url(server.uri())
        .with_retry_policy(fast_retry_policy())
        .build()
        .unwrap()
}

/// A jury talking to `server` with no inter-agent delay.
pub fn jury_for(
    server: &MockServer,
    provider: Provider,
    models: ModelChain,
    signer: AttestationSigner,
) -> Jury {
    let runner = AgentRunner::new(provider_for(server, provider), models);
    Jury::new(Some(runner), signer).with_inter_agent_delay(Duration::ZERO)
}
