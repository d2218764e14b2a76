use strum::Display;
use switchboard_config::{Config, ProviderConfig, ProviderKind};

/// Request/stream format spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum WireDialect {
    /// Flat-history Chat Completions
    ChatCompletions,
    /// `OpenAI` Responses
    Responses,
    /// Hoisted-system Messages
    Messages,
}

impl WireDialect {
    /// Dialect spoken by a provider family
    pub const fn for_kind(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenaiResponses => Self::Responses,
            ProviderKind::Anthropic => Self::Messages,
            ProviderKind::Openai
            | ProviderKind::Openrouter
            | ProviderKind::Groq
            | ProviderKind::Deepseek
            | ProviderKind::Xai
            | ProviderKind::OpenaiCompatible => Self::ChatCompletions,
        }
    }

    /// Path appended to the base URL
    pub const fn path(self) -> &'static str {
        match self {
            Self::ChatCompletions => "/chat/completions",
            Self::Responses => "/responses",
            Self::Messages => "/messages",
        }
    }
}

/// A configured model addressed by its identifier
#[derive(Debug, Clone)]
pub struct ModelTarget {
    /// Identifier events are keyed by
    pub id: String,
    /// Provider configuration for this model
    pub config: ProviderConfig,
}

impl ModelTarget {
    /// Create a target
    pub fn new(id: impl Into<String>, config: ProviderConfig) -> Self {
        Self { id: id.into(), config }
    }

    /// Look up a named provider in the configuration
    pub fn from_config(config: &Config, name: &str) -> Option<Self> {
        config.provider(name).map(|provider| Self::new(name, provider.clone()))
    }
}
