//! Service configuration: optional TOML file, then environment overrides.
//!
//! ```toml
//! [llm]
//! provider = "gemini"
//! api_key = "${GEMINI_API_KEY}"
//! model = "gemini-2.0-flash"
//! fallback_models = ["gemini-2.0-flash-lite"]
//!
//! [attestation]
//! private_key = "${ATTESTATION_PRIVATE_KEY}"
//!
//! [server]
//! port = 4000
//! inter_agent_delay_ms = 1500
//! ```
//!
//! String values may reference environment variables as `${VAR}`.

use std::{env, fmt, fs, path::PathBuf, time::Duration};

use serde::Deserialize;
use thiserror::Error;

use jury_types::{ApiKey, ModelName, ModelParseError, Provider, ProviderParseError};

use crate::agent::ModelChain;
use crate::attestation::{AttestationError, AttestationKey};

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "JURY_CONFIG";

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_INTER_AGENT_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Provider(#[from] ProviderParseError),
    #[error("invalid {field}: {source}")]
    Model {
        field: &'static str,
        #[source]
        source: ModelParseError,
    },
    #[error("invalid {field} value {value:?}")]
    Number { field: &'static str, value: String },
    #[error("invalid attestation key: {0}")]
    AttestationKey(#[source] AttestationError),
}

// ============================================================================
// File format
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub attestation: AttestationSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmSection {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub fallback_models: Vec<String>,
    pub base_url: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl fmt::Debug for LlmSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSection")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("fallback_models", &self.fallback_models)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttestationSection {
    pub private_key: Option<String>,
}

impl fmt::Debug for AttestationSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttestationSection")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub port: Option<u16>,
    pub inter_agent_delay_ms: Option<u64>,
}

impl ConfigFile {
    pub fn parse(path: PathBuf, content: &str) -> Result<Self, ConfigError> {
        let mut file: ConfigFile =
            toml::from_str(content).map_err(|source| ConfigError::Parse { path, source })?;
        file.expand_env_vars();
        Ok(file)
    }

    pub fn read(path: PathBuf) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(source) => {
                tracing::warn!(path = %path.display(), error = %source, "Failed to read config");
                return Err(ConfigError::Read { path, source });
            }
        };
        Self::parse(path, &content)
    }

    fn expand_env_vars(&mut self) {
        let expand = |value: &mut Option<String>| {
            if let Some(v) = value {
                *v = expand_env_vars(v);
            }
        };
        expand(&mut self.llm.provider);
        expand(&mut self.llm.api_key);
        expand(&mut self.llm.model);
        expand(&mut self.llm.base_url);
        expand(&mut self.attestation.private_key);
        for model in &mut self.llm.fallback_models {
            *model = expand_env_vars(model);
        }
    }
}

/// Replace every `${VAR}` with the variable's value; unset variables become empty.
///
/// An unterminated `${` is kept verbatim.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

// ============================================================================
// Resolved configuration
// ============================================================================

/// Everything the service needs, with defaults applied.
#[derive(Clone)]
pub struct JuryConfig {
    pub provider: Provider,
    /// `None` keeps the service up but fails every evaluation.
    pub api_key: Option<ApiKey>,
    pub models: ModelChain,
    pub base_url: Option<String>,
    /// `None` disables attestation for the life of the process.
    pub attestation_key: Option<AttestationKey>,
    pub port: u16,
    pub inter_agent_delay: Duration,
}

impl fmt::Debug for JuryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JuryConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key)
            .field("models", &self.models)
            .field("base_url", &self.base_url)
            .field("attestation_key", &self.attestation_key)
            .field("port", &self.port)
            .field("inter_agent_delay", &self.inter_agent_delay)
            .finish()
    }
}

/// Blank values count as unset.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_model(field: &'static str, raw: &str) -> Result<ModelName, ConfigError> {
    ModelName::parse(raw).map_err(|source| ConfigError::Model { field, source })
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Number {
        field,
        value: raw.to_string(),
    })
}

impl JuryConfig {
    /// Load from `$JURY_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match non_blank(env::var(CONFIG_PATH_ENV).ok()) {
            Some(path) => ConfigFile::read(PathBuf::from(path))?,
            None => ConfigFile::default(),
        };
        Self::resolve(file, |name| env::var(name).ok())
    }

    /// Apply environment overrides from `lookup` on top of `file`.
    pub fn resolve(
        file: ConfigFile,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = |name: &str| non_blank(lookup(name));
        let ConfigFile {
            llm,
            attestation,
            server,
        } = file;

        let provider = match env("LLM_PROVIDER").or(non_blank(llm.provider)) {
            Some(raw) => Provider::parse(&raw)?,
            None => Provider::default(),
        };

        let api_key = env("LLM_API_KEY")
            .or(non_blank(llm.api_key))
            .and_then(ApiKey::new);

        let primary = match env("LLM_MODEL").or(non_blank(llm.model)) {
            Some(raw) => parse_model("LLM_MODEL", &raw)?,
            None => provider.default_model(),
        };

        let fallbacks = match env("LLM_MODEL_FALLBACK") {
            Some(raw) => raw
                .split(',')
                .filter(|m| !m.trim().is_empty())
                .map(|m| parse_model("LLM_MODEL_FALLBACK", m))
                .collect::<Result<Vec<_>, _>>()?,
            None if !llm.fallback_models.is_empty() => llm
                .fallback_models
                .iter()
                .map(|m| parse_model("llm.fallback_models", m))
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![provider.default_fallback_model()],
        };
        let models = fallbacks
            .into_iter()
            .fold(ModelChain::new(primary), ModelChain::with_fallback);

        let attestation_key = env("ATTESTATION_PRIVATE_KEY")
            .or(non_blank(attestation.private_key))
            .map(|raw| AttestationKey::from_hex(&raw))
            .transpose()
            .map_err(ConfigError::AttestationKey)?;

        let port = match env("PORT") {
            Some(raw) => parse_number("PORT", &raw)?,
            None => server.port.unwrap_or(DEFAULT_PORT),
        };

        let inter_agent_delay = match env("JURY_INTER_AGENT_DELAY_MS") {
            Some(raw) => Duration::from_millis(parse_number("JURY_INTER_AGENT_DELAY_MS", &raw)?),
            None => server
                .inter_agent_delay_ms
                .map_or(DEFAULT_INTER_AGENT_DELAY, Duration::from_millis),
        };

        Ok(Self {
            provider,
            api_key,
            models,
            base_url: non_blank(llm.base_url),
            attestation_key,
            port,
            inter_agent_delay,
        })
    }
}
