//! Provider enumeration, model names and API keys.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported LLM transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenRouter,
    Gemini,
}

const PROVIDER_PARSE_VALUES: &[&str] = &["openrouter", "open-router", "gemini", "google"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid provider value '{raw}'; expected one of: {expected:?}")]
pub struct ProviderParseError {
    raw: String,
    expected: &'static [&'static str],
}

impl Provider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Provider::OpenRouter => "openrouter",
            Provider::Gemini => "gemini",
        }
    }

    /// Model used when none is configured.
    #[must_use]
    pub fn default_model(self) -> ModelName {
        match self {
            Provider::OpenRouter => ModelName::from_static("google/gemini-2.0-flash-001"),
            Provider::Gemini => ModelName::from_static("gemini-2.0-flash"),
        }
    }

    /// Cheaper sibling model tried when the primary is rate limited.
    #[must_use]
    pub fn default_fallback_model(self) -> ModelName {
        match self {
            Provider::OpenRouter => ModelName::from_static("google/gemini-2.0-flash-lite-001"),
            Provider::Gemini => ModelName::from_static("gemini-2.0-flash-lite"),
        }
    }

    pub fn parse(s: &str) -> Result<Self, ProviderParseError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" | "open-router" => Ok(Provider::OpenRouter),
            "gemini" | "google" => Ok(Provider::Gemini),
            _ => Err(ProviderParseError {
                raw: s.to_string(),
                expected: PROVIDER_PARSE_VALUES,
            }),
        }
    }

    #[must_use]
    pub const fn all() -> &'static [Provider] {
        &[Provider::OpenRouter, Provider::Gemini]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ModelParseError {
    #[error("model name cannot be empty")]
    Empty,
}

/// A provider model identifier such as `google/gemini-2.0-flash-001`.
///
/// Model ids are opaque to the jury; the only invariant is that they are
/// non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelName(String);

impl ModelName {
    pub fn parse(raw: &str) -> Result<Self, ModelParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ModelParseError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    fn from_static(name: &'static str) -> Self {
        Self(name.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModelName {
    type Error = ModelParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModelName> for String {
    fn from(value: ModelName) -> Self {
        value.0
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider credential.
///
/// The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for blank keys so "configured but empty" behaves like
    /// "not configured".
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}
