//! The full evaluation: input check, three sequential agent runs, verdict,
//! attestation. All-or-nothing: any unrecoverable agent failure fails the
//! whole request and earlier results are dropped.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use jury_providers::{ApiConfig, ProviderError, ProviderErrorKind};
use jury_types::{AgentEvaluation, Attestation, CaseText, CaseTextError, FinalVerdict, Role};

use crate::agent::{AgentError, AgentRunner};
use crate::attestation::{AttestationError, AttestationSigner, VerdictPayload, case_hash};
use crate::config::{DEFAULT_INTER_AGENT_DELAY, JuryConfig};
use crate::validate::ValidationError;
use crate::verdict::{JuryScores, verdict_for};

/// Successful evaluation body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationResponse {
    pub agent_results: Vec<AgentEvaluation>,
    pub final_verdict: FinalVerdict,
    pub attestation: Option<Attestation>,
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Input(#[from] CaseTextError),
    #[error("Missing LLM_API_KEY on backend")]
    MissingApiKey,
    #[error("{role} failed: {source}")]
    Agent {
        role: Role,
        #[source]
        source: AgentError,
    },
    #[error("attestation failed: {0}")]
    Attestation(#[source] AttestationError),
}

/// An [`EvaluationError`] translated for API clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub status: u16,
    /// Stable machine-readable identifier.
    pub code: &'static str,
    pub error: String,
    /// Remediation hint.
    pub details: Option<String>,
}

impl ErrorReport {
    fn new(status: u16, code: &'static str, error: impl Into<String>) -> Self {
        Self {
            status,
            code,
            error: error.into(),
            details: None,
        }
    }

    fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl EvaluationError {
    #[must_use]
    pub fn report(&self) -> ErrorReport {
        match self {
            Self::Input(CaseTextError::Empty) => {
                ErrorReport::new(400, "input_invalid", "case_text is required")
            }
            Self::Input(err @ CaseTextError::TooLong { .. }) => {
                ErrorReport::new(400, "input_invalid", "case_text is too long")
                    .details(err.to_string())
            }
            Self::MissingApiKey => {
                ErrorReport::new(500, "configuration_missing", self.to_string())
                    .details("Set LLM_API_KEY and restart the service.")
            }
            Self::Agent { source, .. } => match source {
                AgentError::Validation(err) => validation_report(err),
                AgentError::Provider(err) => provider_report(err),
            },
            Self::Attestation(err) => {
                ErrorReport::new(500, "evaluation_failed", "Evaluation failed").details(err.to_string())
            }
        }
    }
}

fn validation_report(err: &ValidationError) -> ErrorReport {
    match err {
        ValidationError::InvalidJson { .. } => {
            ErrorReport::new(502, err.code(), "Model response is not valid JSON").details(
                "Model output did not match strict JSON expectations. \
                 Retry the request and verify LLM_MODEL.",
            )
        }
        ValidationError::Schema { .. } => {
            ErrorReport::new(502, err.code(), "Model response failed schema validation").details(
                "Model returned JSON but not in the required schema. \
                 Retry the request and keep prompt/model stable.",
            )
        }
        ValidationError::SchemaUnavailable(_) => {
            ErrorReport::new(500, "evaluation_failed", "Evaluation failed").details(err.to_string())
        }
    }
}

fn provider_report(err: &ProviderError) -> ErrorReport {
    match err.kind() {
        ProviderErrorKind::Authentication => {
            let status = err.status().unwrap_or(401);
            ErrorReport::new(
                401,
                "provider_auth",
                format!("LLM call failed ({status}) / invalid API key"),
            )
            .details(
                "Use a valid API key and make sure there are no extra spaces \
                 or wrong characters in LLM_API_KEY.",
            )
        }
        ProviderErrorKind::RateLimited => ErrorReport::new(
            429,
            "provider_rate_limited",
            "LLM call failed (429) / quota-rate limit",
        )
        .details("Check provider quota/billing, wait a bit, then retry."),
        ProviderErrorKind::Network => ErrorReport::new(
            504,
            "provider_unavailable",
            "LLM provider timeout/network failure",
        )
        .details("Temporary provider/network issue. Retry shortly."),
        ProviderErrorKind::Http | ProviderErrorKind::MalformedResponse => {
            ErrorReport::new(500, "evaluation_failed", "Evaluation failed").details(err.to_string())
        }
    }
}

/// The three-seat jury plus its attestation signer.
#[derive(Debug, Clone)]
pub struct Jury {
    /// `None` when no API key is configured.
    runner: Option<AgentRunner>,
    signer: AttestationSigner,
    inter_agent_delay: Duration,
}

impl Jury {
    #[must_use]
    pub fn new(runner: Option<AgentRunner>, signer: AttestationSigner) -> Self {
        Self {
            runner,
            signer,
            inter_agent_delay: DEFAULT_INTER_AGENT_DELAY,
        }
    }

    /// Pause between consecutive agent calls to soften provider bursts.
    #[must_use]
    pub fn with_inter_agent_delay(mut self, delay: Duration) -> Self {
        self.inter_agent_delay = delay;
        self
    }

    /// Build the provider client and signer described by `config`.
    pub fn from_config(config: &JuryConfig) -> Result<Self, ProviderError> {
        let runner = match &config.api_key {
            Some(api_key) => {
                let mut api = ApiConfig::new(config.provider, api_key.clone());
                if let Some(base_url) = &config.base_url {
                    api = api.with_base_url(base_url.clone());
                }
                Some(AgentRunner::new(api.build()?, config.models.clone()))
            }
            None => {
                tracing::warn!("LLM_API_KEY is not set; evaluations will fail until it is configured");
                None
            }
        };

        let signer = AttestationSigner::new(config.attestation_key.clone());
        match signer.attestor() {
            Some(attestor) => tracing::info!(%attestor, "Verdict attestation enabled"),
            None => tracing::info!("Verdict attestation disabled"),
        }

        Ok(Self::new(runner, signer).with_inter_agent_delay(config.inter_agent_delay))
    }

    #[must_use]
    pub fn signer(&self) -> &AttestationSigner {
        &self.signer
    }

    /// Evaluate raw case text end to end.
    ///
    /// Input is validated before configuration so a bad request is reported
    /// as such even on a misconfigured service.
    pub async fn evaluate(&self, raw_case: &str) -> Result<EvaluationResponse, EvaluationError> {
        let evaluation_id = Uuid::new_v4();
        self.run(raw_case)
            .instrument(tracing::info_span!("evaluation", %evaluation_id))
            .await
    }

    async fn run(&self, raw_case: &str) -> Result<EvaluationResponse, EvaluationError> {
        let case = CaseText::new(raw_case)?;
        let runner = self.runner.as_ref().ok_or(EvaluationError::MissingApiKey)?;

        let mut agent_results = Vec::with_capacity(Role::ALL.len());
        for (index, role) in Role::ALL.into_iter().enumerate() {
            if index > 0 && !self.inter_agent_delay.is_zero() {
                tokio::time::sleep(self.inter_agent_delay).await;
            }
            let evaluation = runner.evaluate(role, &case).await.map_err(|source| {
                tracing::warn!(role = %role, error = %source, "Agent evaluation failed");
                EvaluationError::Agent { role, source }
            })?;
            tracing::info!(role = %role, score = %evaluation.score, "Agent evaluation complete");
            agent_results.push(evaluation);
        }

        let scores = JuryScores::from_evaluations(&agent_results);
        let final_verdict = verdict_for(scores);

        let payload = VerdictPayload::new(
            case_hash(&case),
            scores,
            final_verdict.final_score,
            &final_verdict.summary,
        );
        let attestation = self
            .signer
            .sign(&payload)
            .map_err(EvaluationError::Attestation)?;

        tracing::info!(
            final_score = %final_verdict.final_score,
            decision = %final_verdict.decision,
            attested = attestation.is_some(),
            "Evaluation complete"
        );

        Ok(EvaluationResponse {
            agent_results,
            final_verdict,
            attestation,
        })
    }
}
