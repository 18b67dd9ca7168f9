//! One jury seat: prompt construction, provider call, validation, and
//! rate-limit model fallback.

use std::sync::Arc;

use thiserror::Error;

use jury_providers::{CompletionRequest, LlmProvider, ModelName, ProviderError};
use jury_types::{AgentEvaluation, CaseText, Role};

use crate::validate::{MAX_LIST_ITEMS, MAX_RATIONALE_CHARS, ValidationError, parse_evaluation};

const JSON_SYSTEM_RULES: &str = "You are a strict JSON API.\n\
Return ONLY valid JSON. No markdown, no backticks, no prose outside JSON.";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl AgentError {
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Provider(err) if err.is_rate_limited())
    }
}

/// A primary model and the distinct models tried, in order, when it is rate limited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChain {
    primary: ModelName,
    fallbacks: Vec<ModelName>,
}

impl ModelChain {
    #[must_use]
    pub fn new(primary: ModelName) -> Self {
        Self {
            primary,
            fallbacks: Vec::new(),
        }
    }

    /// Append a fallback. Models already in the chain are ignored.
    #[must_use]
    pub fn with_fallback(mut self, model: ModelName) -> Self {
        if model != self.primary && !self.fallbacks.contains(&model) {
            self.fallbacks.push(model);
        }
        self
    }

    #[must_use]
    pub fn primary(&self) -> &ModelName {
        &self.primary
    }

    #[must_use]
    pub fn fallbacks(&self) -> &[ModelName] {
        &self.fallbacks
    }
}

pub(crate) fn system_prompt(role: Role) -> String {
    format!(
        r#"{JSON_SYSTEM_RULES}

You are the "{role}" in a startup hackathon jury.
Output schema:
{{
  "score": number 0-100,
  "confidence": number 0-100,
  "score_breakdown": {{ "primary": number 0-100, "secondary": number 0-100, "tertiary": number 0-100 }},
  "pros": ["string", "..."] (at most {MAX_LIST_ITEMS}),
  "cons": ["string", "..."] (at most {MAX_LIST_ITEMS}),
  "rationale": "short explanation, at most {MAX_RATIONALE_CHARS} characters",
  "evidence": ["string", "..."] (optional, at most 5),
  "uncertainty_flags": ["string", "..."] (optional, at most 5)
}}"#
    )
}

pub(crate) fn user_prompt(case_text: &str, focus: &str) -> String {
    format!(
        "Evaluate this case:\n\"{case_text}\"\n\n\
Focus:\n{focus}\n\n\
Constraints:\n\
- Keep pros/cons concise and practical.\n\
- Score must be numeric 0-100.\n\
- Return JSON only."
    )
}

/// Runs jury seats against one provider and model chain.
#[derive(Clone)]
pub struct AgentRunner {
    provider: Arc<dyn LlmProvider>,
    models: ModelChain,
}

impl std::fmt::Debug for AgentRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRunner")
            .field("provider", &self.provider.provider())
            .field("models", &self.models)
            .finish()
    }
}

impl AgentRunner {
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, models: ModelChain) -> Self {
        Self { provider, models }
    }

    /// Evaluate `case` from the point of view of `role`.
    ///
    /// Only a rate-limited provider failure moves on to the next fallback
    /// model. When every model is rate limited, the last fallback's error is
    /// returned.
    pub async fn evaluate(
        &self,
        role: Role,
        case: &CaseText,
    ) -> Result<AgentEvaluation, AgentError> {
        self.evaluate_with_focus(role, role.focus(), case).await
    }

    async fn evaluate_with_focus(
        &self,
        role: Role,
        focus: &str,
        case: &CaseText,
    ) -> Result<AgentEvaluation, AgentError> {
        let system = system_prompt(role);
        let user = user_prompt(case.as_str(), focus);

        let mut result = self.attempt(role, self.models.primary(), &system, &user).await;
        for fallback in self.models.fallbacks() {
            match &result {
                Err(err) if err.is_rate_limited() => {
                    tracing::warn!(
                        role = %role,
                        model = %fallback,
                        "Rate limited; falling back to next model"
                    );
                    result = self.attempt(role, fallback, &system, &user).await;
                }
                _ => break,
            }
        }
        result
    }

    async fn attempt(
        &self,
        role: Role,
        model: &ModelName,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<AgentEvaluation, AgentError> {
        tracing::debug!(role = %role, model = %model, "Requesting agent evaluation");
        let request = CompletionRequest {
            model,
            system_prompt,
            user_prompt,
        };
        let raw = self.provider.complete(&request).await?;
        Ok(parse_evaluation(&raw, role)?)
    }
}
