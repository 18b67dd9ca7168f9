//! Core domain types for the agent jury.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod evaluation;
mod model;
mod score;
mod verdict;

pub use evaluation::{AgentEvaluation, Role, ScoreBreakdown};
pub use model::{ApiKey, ModelName, ModelParseError, Provider, ProviderParseError};
pub use score::{Score, ScoreRangeError};
pub use verdict::{Attestation, Decision, FinalVerdict, ITERATE_THRESHOLD, SHIP_THRESHOLD};

use thiserror::Error;

// ============================================================================
// Case Text
// ============================================================================

/// Maximum case length, in characters.
pub const MAX_CASE_CHARS: usize = 4000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaseTextError {
    #[error("case_text is required")]
    Empty,
    #[error("case_text is too long ({chars} characters, maximum {max})")]
    TooLong { chars: usize, max: usize },
}

/// The submission under evaluation: trimmed, non-empty, at most
/// [`MAX_CASE_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseText(String);

impl CaseText {
    pub fn new(raw: &str) -> Result<Self, CaseTextError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CaseTextError::Empty);
        }
        let chars = trimmed.chars().count();
        if chars > MAX_CASE_CHARS {
            return Err(CaseTextError::TooLong {
                chars,
                max: MAX_CASE_CHARS,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Truncate to at most `max_chars` characters without splitting a code point.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
