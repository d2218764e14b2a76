//! API key lookup

use secrecy::SecretString;
use switchboard_config::{ProviderConfig, ProviderKind};

use crate::error::LlmError;

/// Source of provider API keys
///
/// Implementations may consult a keychain or vault; the engine asks once
/// per request so rotated keys take effect without a restart.
pub trait SecretResolver: Send + Sync {
    /// API key for `provider`
    fn api_key(&self, provider: &str, config: &ProviderConfig) -> Result<SecretString, LlmError>;
}

/// Resolver reading keys straight from configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigSecretResolver;

impl SecretResolver for ConfigSecretResolver {
    fn api_key(&self, provider: &str, config: &ProviderConfig) -> Result<SecretString, LlmError> {
        match &config.api_key {
            Some(key) => Ok(key.clone()),
            // Local servers usually run without authentication
            None if config.kind == ProviderKind::OpenaiCompatible => Ok(SecretString::from("")),
            None => Err(LlmError::Authentication {
                provider: provider.to_owned(),
                message: "no API key configured".to_owned(),
            }),
        }
    }
}
