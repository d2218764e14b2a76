use std::time::Duration;

use serde::Deserialize;

/// Retry policy for transient upstream failures
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(default = "default_initial_delay", deserialize_with = "crate::duration::deserialize")]
    pub initial_delay: Duration,
    /// Upper bound for computed backoff delays
    #[serde(default = "default_max_delay", deserialize_with = "crate::duration::deserialize")]
    pub max_delay: Duration,
    /// Exponential growth factor between attempts
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Fraction of the base delay added as random jitter (0.0 to 1.0)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

const fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_jitter() -> f64 {
    0.2
}

/// Circuit breaker thresholds applied per endpoint key
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long an open circuit rejects requests before allowing a trial
    #[serde(default = "default_cooldown", deserialize_with = "crate::duration::deserialize")]
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown: default_cooldown(),
        }
    }
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_cooldown() -> Duration {
    Duration::from_secs(30)
}
