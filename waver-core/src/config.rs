use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Configuration is missing or unusable. Raised before any pipeline stage runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The closed set of content-generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LlmProvider {
    #[serde(rename = "OpenAI")]
    OpenAi,
    Gemini,
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 2] = [LlmProvider::OpenAi, LlmProvider::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "OpenAI",
            LlmProvider::Gemini => "Gemini",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LlmProvider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::Invalid(format!("unknown LLM provider '{s}'")))
    }
}

/// Format of the generated tutorial files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
        }
    }
}

/// What the pipeline produces from a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    #[default]
    Tutorial,
}

/// Optional per-provider credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProviderKeys {
    #[serde(default)]
    pub api_key: Option<String>,
}

impl fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderKeys")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Process-wide generation settings (the `waver` section of the config file).
///
/// The provider selector is kept as the raw configured string: it is only
/// validated when a request is resolved, see [`crate::provider::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WaverSettings {
    #[serde(default)]
    pub llm_provider: Option<String>,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub openai: ProviderKeys,
    #[serde(default)]
    pub gemini: ProviderKeys,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("output")
}

impl Default for WaverSettings {
    fn default() -> Self {
        Self {
            llm_provider: None,
            output_path: default_output_path(),
            verbose: false,
            output_format: OutputFormat::default(),
            openai: ProviderKeys::default(),
            gemini: ProviderKeys::default(),
        }
    }
}

impl WaverSettings {
    pub fn trace_loaded(&self) {
        info!(
            llm_provider = self.llm_provider.as_deref().unwrap_or("<unset>"),
            output_path = %self.output_path.display(),
            output_format = ?self.output_format,
            verbose = self.verbose,
            "Loaded waver settings"
        );
        debug!(?self, "Waver settings loaded (full debug)");
    }
}

/// Object-store connection settings (the `minio` section of the config file).
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreSettings {
    pub endpoint: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    pub bucket_name: String,
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

impl StoreSettings {
    pub fn trace_loaded(&self) {
        info!(
            endpoint = %self.endpoint,
            bucket = %self.bucket_name,
            access_key_set = !self.access_key.is_empty(),
            "Loaded object store settings"
        );
    }
}

/// A resolved provider together with its credential.
///
/// Only [`crate::provider::resolve`] builds these, and it never builds one
/// without a key.
#[derive(Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    OpenAi { api_key: String },
    Gemini { api_key: String },
}

impl ProviderConfig {
    pub fn api_key(&self) -> &str {
        match self {
            ProviderConfig::OpenAi { api_key } | ProviderConfig::Gemini { api_key } => api_key,
        }
    }

    pub fn provider(&self) -> LlmProvider {
        match self {
            ProviderConfig::OpenAi { .. } => LlmProvider::OpenAi,
            ProviderConfig::Gemini { .. } => LlmProvider::Gemini,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderConfig::{}(<redacted>)", self.provider())
    }
}

/// Everything one generation request needs, built once per request.
#[derive(Clone)]
pub struct AppConfig {
    pub input_path: String,
    pub absolute_output_path: PathBuf,
    pub provider: ProviderConfig,
    pub verbose: bool,
    pub project_name: String,
    pub output_format: OutputFormat,
    pub generation_kind: GenerationKind,
}

impl AppConfig {
    /// Directory the writing stages fill and the uploader walks.
    pub fn output_dir(&self) -> PathBuf {
        self.absolute_output_path.join(&self.project_name)
    }

    pub fn api_key(&self) -> &str {
        self.provider.api_key()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("input_path", &self.input_path)
            .field("absolute_output_path", &self.absolute_output_path)
            .field("provider", &self.provider)
            .field("verbose", &self.verbose)
            .field("project_name", &self.project_name)
            .field("output_format", &self.output_format)
            .field("generation_kind", &self.generation_kind)
            .finish()
    }
}
