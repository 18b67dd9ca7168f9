//! Evaluation engine for the agent jury.
//!
//! Turns one case into three role evaluations, a weighted verdict and an
//! optional signed attestation:
//!
//! - [`validate`] - extract JSON from model text and check it against the
//!   current or legacy output contract
//! - [`agent`] - prompt one jury seat, with rate-limit model fallback
//! - [`verdict`] - weighted aggregation, decision and next steps
//! - [`attestation`] - keccak digest of the verdict tuple, personal-message signature
//! - [`pipeline`] - the request-level flow and its error taxonomy
//! - [`config`] - TOML file plus environment overrides

pub mod agent;
pub mod attestation;
pub mod config;
pub mod pipeline;
pub mod validate;
pub mod verdict;

#[cfg(test)]
mod testing;

pub use agent::{AgentError, AgentRunner, ModelChain};
pub use attestation::{AttestationError, AttestationKey, AttestationSigner, recover_attestor};
pub use config::{ConfigError, JuryConfig};
pub use jury_providers::{self, ApiConfig};
pub use jury_types::{
    AgentEvaluation, ApiKey, Attestation, CaseText, Decision, FinalVerdict, ModelName, Provider,
    Role, Score,
};
pub use pipeline::{ErrorReport, EvaluationError, EvaluationResponse, Jury};
pub use validate::{AgentResponse, ValidationError};
pub use verdict::{JuryScores, build_final_verdict};
