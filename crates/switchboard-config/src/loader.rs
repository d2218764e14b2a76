use std::path::Path;

use http::{HeaderName, HeaderValue};

use crate::{Config, ProviderKind};

/// Largest accepted tool chain depth
const MAX_CHAIN_DEPTH_LIMIT: u32 = 100;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, placeholder expansion
    /// fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let config = Self::parse(&raw)?;
        tracing::debug!(path = %path.display(), providers = config.providers.len(), "configuration loaded");

        Ok(config)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if placeholder expansion, TOML parsing or
    /// validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistency found
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_retry()?;
        self.validate_limits()?;
        self.validate_providers()?;
        Ok(())
    }

    fn validate_retry(&self) -> anyhow::Result<()> {
        let retry = &self.retry;

        if retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if retry.initial_delay > retry.max_delay {
            anyhow::bail!("retry.initial_delay must not exceed retry.max_delay");
        }
        if !(0.0..=1.0).contains(&retry.jitter) {
            anyhow::bail!("retry.jitter must lie between 0.0 and 1.0");
        }
        // Keeps jittered delays monotone across attempts
        if retry.multiplier < 1.0 + retry.jitter {
            anyhow::bail!("retry.multiplier must be at least 1 + retry.jitter");
        }

        Ok(())
    }

    fn validate_limits(&self) -> anyhow::Result<()> {
        if self.circuit_breaker.failure_threshold == 0 {
            anyhow::bail!("circuit_breaker.failure_threshold must be at least 1");
        }
        if !(1..=MAX_CHAIN_DEPTH_LIMIT).contains(&self.tools.max_chain_depth) {
            anyhow::bail!("tools.max_chain_depth must lie between 1 and {MAX_CHAIN_DEPTH_LIMIT}");
        }
        if self.attachments.max_bytes == 0 {
            anyhow::bail!("attachments.max_bytes must be greater than 0");
        }

        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("at least one provider must be configured");
        }

        for (name, provider) in &self.providers {
            if provider.model.trim().is_empty() {
                anyhow::bail!("provider '{name}' has an empty model");
            }

            let has_base_url = provider.base_url.as_deref().is_some_and(|url| !url.trim().is_empty());
            if provider.kind == ProviderKind::OpenaiCompatible && !has_base_url {
                anyhow::bail!("provider '{name}' of type openai_compatible requires base_url");
            }

            for (header, value) in &provider.headers {
                HeaderName::try_from(header.as_str())
                    .map_err(|e| anyhow::anyhow!("provider '{name}' has invalid header name '{header}': {e}"))?;
                HeaderValue::try_from(value.as_str())
                    .map_err(|e| anyhow::anyhow!("provider '{name}' has invalid value for header '{header}': {e}"))?;
            }
        }

        Ok(())
    }
}
