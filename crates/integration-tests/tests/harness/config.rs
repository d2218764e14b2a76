//! Programmatic configuration builder for integration tests

use std::time::Duration;

use switchboard_config::{Config, ProviderConfig, ProviderKind};
use switchboard_llm::ModelTarget;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Loopback allowed, fast retries, no jitter
    pub fn new() -> Self {
        let mut config = Config::default();
        config.client.allow_insecure_loopback = true;
        config.client.idle_timeout = Duration::from_secs(5);
        config.retry.initial_delay = Duration::from_millis(10);
        config.retry.max_delay = Duration::from_millis(100);
        config.retry.jitter = 0.0;
        Self { config }
    }

    /// Add a provider pointed at a mock backend
    pub fn with_provider(mut self, name: &str, kind: ProviderKind, base_url: &str) -> Self {
        self.config.providers.insert(
            name.to_owned(),
            ProviderConfig::new(kind, format!("{name}-model"))
                .with_api_key("test-key")
                .with_base_url(base_url),
        );
        self
    }

    /// Add a Chat Completions provider pointed at a mock backend
    pub fn with_openai_provider(self, name: &str, base_url: &str) -> Self {
        self.with_provider(name, ProviderKind::Openai, base_url)
    }

    /// Set the retry attempt budget
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    /// Set circuit breaker thresholds
    pub fn with_circuit_breaker(mut self, failure_threshold: u32, cooldown: Duration) -> Self {
        self.config.circuit_breaker.failure_threshold = failure_threshold;
        self.config.circuit_breaker.cooldown = cooldown;
        self
    }

    /// Set the tool chain limit
    pub fn with_max_chain_depth(mut self, depth: u32) -> Self {
        self.config.tools.max_chain_depth = depth;
        self
    }

    /// Set the idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.client.idle_timeout = timeout;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Target for a configured provider
pub fn target(config: &Config, name: &str) -> ModelTarget {
    ModelTarget::from_config(config, name).expect("provider configured")
}
