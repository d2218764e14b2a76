use std::time::Duration;

use serde::Deserialize;

/// Transport settings shared by all provider clients
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Maximum silence on an open stream before it counts as a timeout
    #[serde(default = "default_idle_timeout", deserialize_with = "crate::duration::deserialize")]
    pub idle_timeout: Duration,
    /// TCP/TLS connect timeout
    #[serde(default = "default_connect_timeout", deserialize_with = "crate::duration::deserialize")]
    pub connect_timeout: Duration,
    /// Purpose label folded into circuit breaker keys
    #[serde(default = "default_purpose")]
    pub purpose: String,
    /// Permit plain HTTP to loopback hosts (local model servers, test doubles)
    #[serde(default)]
    pub allow_insecure_loopback: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            idle_timeout: default_idle_timeout(),
            connect_timeout: default_connect_timeout(),
            purpose: default_purpose(),
            allow_insecure_loopback: false,
        }
    }
}

const fn default_idle_timeout() -> Duration {
    Duration::from_secs(60)
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_purpose() -> String {
    "chat".to_owned()
}
