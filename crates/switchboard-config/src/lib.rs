#![allow(clippy::must_use_candidate)]

//! Configuration model for Switchboard
//!
//! Loaded from a TOML file with `{{ env.VAR }}` placeholder expansion,
//! then validated before any provider client is built.

pub mod client;
mod duration;
mod env;
mod loader;
pub mod provider;
pub mod resilience;
pub mod telemetry;
pub mod tools;

use indexmap::IndexMap;
use serde::Deserialize;

pub use client::*;
pub use provider::*;
pub use resilience::*;
pub use telemetry::*;
pub use tools::*;

/// Top-level Switchboard configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Transport settings shared by every provider client
    #[serde(default)]
    pub client: ClientConfig,
    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
    /// Per-endpoint circuit breaker thresholds
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Tool loop limits
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Attachment validation limits
    #[serde(default)]
    pub attachments: AttachmentsConfig,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Provider configurations keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
}

impl Config {
    /// Look up a provider by its configured name
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}
