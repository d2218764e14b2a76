use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use strum::{Display, EnumIter, EnumString};

/// Configuration for a single model target
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Provider family, which also fixes the wire dialect
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    /// Model identifier sent upstream
    pub model: String,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Custom base URL, must be HTTPS
    #[serde(default)]
    pub base_url: Option<String>,
    /// Extra request headers
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Reasoning effort hint for OpenAI-family reasoning models
    #[serde(default)]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Extended thinking budget for Anthropic-family models
    #[serde(default)]
    pub thinking_budget: Option<u32>,
}

impl ProviderConfig {
    /// Create a configuration with only the required fields set
    pub fn new(kind: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            api_key: None,
            base_url: None,
            headers: IndexMap::new(),
            temperature: None,
            max_tokens: None,
            reasoning_effort: None,
            thinking_budget: None,
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Set a custom base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Supported provider families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderKind {
    /// `OpenAI` Chat Completions API
    Openai,
    /// `OpenAI` Responses API
    OpenaiResponses,
    /// Anthropic Messages API
    Anthropic,
    /// `OpenRouter` (Chat Completions dialect)
    Openrouter,
    /// Groq (Chat Completions dialect)
    Groq,
    /// `DeepSeek` (Chat Completions dialect)
    Deepseek,
    /// xAI (Chat Completions dialect)
    Xai,
    /// Any Chat Completions compatible server, `base_url` required
    OpenaiCompatible,
}

/// Reasoning effort levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReasoningEffort {
    /// Minimal reasoning
    Low,
    /// Balanced reasoning
    Medium,
    /// Maximum reasoning
    High,
}
