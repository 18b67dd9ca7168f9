//! Model output extraction and schema validation.
//!
//! Model text is reduced to a JSON document, then checked against the current
//! output contract and, failing that, the smaller legacy contract that earlier
//! prompt/model versions produced. The two accepted shapes are kept apart as
//! [`AgentResponse::Current`] and [`AgentResponse::Legacy`] until
//! normalization.

use std::sync::OnceLock;

use jsonschema::Validator;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use jury_types::{AgentEvaluation, Role, Score, ScoreBreakdown};

/// Maximum entries in `pros` / `cons`.
pub const MAX_LIST_ITEMS: usize = 10;
/// Maximum characters in `rationale`.
pub const MAX_RATIONALE_CHARS: usize = 1200;

/// Confidence assigned to legacy responses, which carry none.
pub const LEGACY_CONFIDENCE: u8 = 50;
/// Flag attached to every evaluation normalized from a legacy response.
pub const LEGACY_FORMAT_FLAG: &str = "legacy_response_format";

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Model response is not valid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
    #[error("Model response failed schema validation: {current}")]
    Schema {
        /// Why the current contract rejected the document.
        current: String,
        /// Why the legacy contract rejected the document.
        legacy: String,
    },
    #[error("Model response schema could not be compiled: {0}")]
    SchemaUnavailable(String),
}

impl ValidationError {
    /// Stable machine-readable identifier.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson { .. } => "invalid_json",
            Self::Schema { .. } => "schema_validation",
            Self::SchemaUnavailable(_) => "schema_unavailable",
        }
    }
}

// ============================================================================
// Schemas
// ============================================================================

fn bounded_score() -> Value {
    json!({ "type": "number", "minimum": 0, "maximum": 100 })
}

fn string_list(max_items: usize, max_chars: usize) -> Value {
    json!({
        "type": "array",
        "maxItems": max_items,
        "items": { "type": "string", "maxLength": max_chars }
    })
}

fn rationale() -> Value {
    json!({ "type": "string", "minLength": 1, "maxLength": MAX_RATIONALE_CHARS })
}

fn current_schema() -> Value {
    json!({
        "type": "object",
        "required": ["score", "confidence", "pros", "cons", "rationale"],
        "properties": {
            "score": bounded_score(),
            "confidence": bounded_score(),
            "score_breakdown": {
                "type": "object",
                "required": ["primary", "secondary", "tertiary"],
                "properties": {
                    "primary": bounded_score(),
                    "secondary": bounded_score(),
                    "tertiary": bounded_score()
                }
            },
            "pros": string_list(MAX_LIST_ITEMS, 300),
            "cons": string_list(MAX_LIST_ITEMS, 300),
            "evidence": string_list(5, 500),
            "rationale": rationale(),
            "uncertainty_flags": string_list(5, 200)
        }
    })
}

fn legacy_schema() -> Value {
    json!({
        "type": "object",
        "required": ["score", "pros", "cons", "rationale"],
        "properties": {
            "score": bounded_score(),
            "pros": string_list(MAX_LIST_ITEMS, 300),
            "cons": string_list(MAX_LIST_ITEMS, 300),
            "rationale": rationale()
        }
    })
}

type CompiledSchema = Result<Validator, String>;

fn compiled(
    cell: &'static OnceLock<CompiledSchema>,
    schema: fn() -> Value,
) -> Result<&'static Validator, ValidationError> {
    cell.get_or_init(|| jsonschema::validator_for(&schema()).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| ValidationError::SchemaUnavailable(e.clone()))
}

fn check(validator: &Validator, document: &Value) -> Result<(), String> {
    validator.validate(document).map_err(|err| err.to_string())
}

// ============================================================================
// Accepted shapes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RawBreakdown {
    pub primary: f64,
    pub secondary: f64,
    pub tertiary: f64,
}

/// The current output contract. Unknown extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurrentResponse {
    pub score: f64,
    pub confidence: f64,
    #[serde(default)]
    pub score_breakdown: Option<RawBreakdown>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub rationale: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub uncertainty_flags: Vec<String>,
}

/// The pre-confidence output contract. Unknown extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyResponse {
    pub score: f64,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentResponse {
    Current(CurrentResponse),
    Legacy(LegacyResponse),
}

impl AgentResponse {
    /// Extract, parse and validate raw model text.
    ///
    /// The current contract is tried first; the legacy contract only when the
    /// current one rejects the document.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        static CURRENT: OnceLock<CompiledSchema> = OnceLock::new();
        static LEGACY: OnceLock<CompiledSchema> = OnceLock::new();

        let document: Value = serde_json::from_str(extract_json(text))
            .map_err(|source| ValidationError::InvalidJson { source })?;

        let current_violation = match check(compiled(&CURRENT, current_schema)?, &document) {
            Ok(()) => {
                return deserialize(document).map(Self::Current);
            }
            Err(violation) => violation,
        };

        match check(compiled(&LEGACY, legacy_schema)?, &document) {
            Ok(()) => {
                tracing::debug!(%current_violation, "Accepted legacy-format model response");
                deserialize(document).map(Self::Legacy)
            }
            Err(legacy_violation) => Err(ValidationError::Schema {
                current: current_violation,
                legacy: legacy_violation,
            }),
        }
    }

    #[must_use]
    pub const fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// Clamp scores and fill the fields a legacy response lacks.
    #[must_use]
    pub fn into_evaluation(self, role: Role) -> AgentEvaluation {
        match self {
            Self::Current(response) => AgentEvaluation {
                role,
                score: Score::clamp(response.score),
                confidence: Score::clamp(response.confidence),
                score_breakdown: response.score_breakdown.map(|b| ScoreBreakdown {
                    primary: Score::clamp(b.primary),
                    secondary: Score::clamp(b.secondary),
                    tertiary: Score::clamp(b.tertiary),
                }),
                pros: response.pros,
                cons: response.cons,
                rationale: response.rationale,
                evidence: response.evidence,
                uncertainty_flags: response.uncertainty_flags,
            },
            Self::Legacy(response) => {
                let score = Score::clamp(response.score);
                AgentEvaluation {
                    role,
                    score,
                    confidence: Score::clamp(f64::from(LEGACY_CONFIDENCE)),
                    score_breakdown: Some(ScoreBreakdown::uniform(score)),
                    pros: response.pros,
                    cons: response.cons,
                    rationale: response.rationale,
                    evidence: Vec::new(),
                    uncertainty_flags: vec![LEGACY_FORMAT_FLAG.to_string()],
                }
            }
        }
    }
}

fn deserialize<T: serde::de::DeserializeOwned>(document: Value) -> Result<T, ValidationError> {
    serde_json::from_value(document).map_err(|e| ValidationError::Schema {
        current: e.to_string(),
        legacy: e.to_string(),
    })
}

/// Validate raw model text and normalize it into an evaluation for `role`.
pub fn parse_evaluation(text: &str, role: Role) -> Result<AgentEvaluation, ValidationError> {
    AgentResponse::parse(text).map(|response| response.into_evaluation(role))
}

/// Reduce model text to the JSON document it most likely contains.
///
/// Preference order: the body of the first code fence, then the span from the
/// first `{` to the last `}`, then the trimmed text itself.
#[must_use]
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(body) = fenced_block(trimmed) {
        return body;
    }

    if let (Some(first), Some(last)) = (trimmed.find('{'), trimmed.rfind('}'))
        && last > first
    {
        return &trimmed[first..=last];
    }

    trimmed
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let rest = &text[open + 3..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let close = rest.find("```")?;
    Some(rest[..close].trim())
}
