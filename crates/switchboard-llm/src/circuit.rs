//! Per-endpoint circuit breakers
//!
//! One registry is shared by every provider client of an engine. Each key
//! maps to a small state machine:
//!
//! - `Closed`: requests flow; consecutive failures are counted
//! - `Open`: requests are rejected until the cooldown elapses
//! - `HalfOpen`: exactly one trial request is in flight; its outcome
//!   closes or reopens the circuit
//!
//! All reads and writes of one key happen under that key's map entry
//! guard, so transitions are serialized.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use strum::Display;
use switchboard_config::CircuitBreakerConfig;

/// Identifies one breaker: endpoint URL plus client purpose
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CircuitKey {
    endpoint: String,
    purpose: String,
}

impl CircuitKey {
    /// Create a key
    pub fn new(endpoint: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            purpose: purpose.into(),
        }
    }

    /// Endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Client purpose
    pub fn purpose(&self) -> &str {
        &self.purpose
    }
}

impl fmt::Display for CircuitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.purpose, self.endpoint)
    }
}

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CircuitStatus {
    /// Requests flow normally
    Closed,
    /// Requests are rejected
    Open,
    /// One trial request decides the next state
    HalfOpen,
}

#[derive(Debug)]
struct CircuitEntry {
    status: CircuitStatus,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Default for CircuitEntry {
    fn default() -> Self {
        Self {
            status: CircuitStatus::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitSnapshot {
    /// Breaker key
    pub key: CircuitKey,
    /// Current state
    pub status: CircuitStatus,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// When the circuit last opened
    pub opened_at: Option<Instant>,
}

/// Registry of breakers keyed by endpoint and purpose
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    circuits: DashMap<CircuitKey, CircuitEntry>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            circuits: DashMap::new(),
            failure_threshold: config.failure_threshold.max(1),
            cooldown: config.cooldown,
        }
    }

    /// Ask to send one request to `key`
    ///
    /// Returns `None` while the circuit is open, or while it is half-open
    /// and the trial request has not resolved yet.
    pub fn check_permission(self: &Arc<Self>, key: &CircuitKey) -> Option<CircuitPermit> {
        let trial = {
            let mut entry = self.circuits.entry(key.clone()).or_default();
            match entry.status {
                CircuitStatus::Closed => false,
                CircuitStatus::Open => {
                    let cooled = entry.opened_at.is_none_or(|at| at.elapsed() >= self.cooldown);
                    if !cooled {
                        return None;
                    }
                    entry.status = CircuitStatus::HalfOpen;
                    entry.trial_in_flight = true;
                    tracing::info!(circuit = %key, "circuit half-open, allowing one trial request");
                    true
                }
                CircuitStatus::HalfOpen => {
                    if entry.trial_in_flight {
                        return None;
                    }
                    entry.trial_in_flight = true;
                    true
                }
            }
        };

        Some(CircuitPermit {
            registry: Arc::clone(self),
            key: key.clone(),
            trial,
            resolved: false,
        })
    }

    /// Record a successful request admitted while the circuit was closed
    pub fn record_success(&self, key: &CircuitKey) {
        self.record_outcome(key, false, true);
    }

    /// Record a failed request admitted while the circuit was closed
    pub fn record_failure(&self, key: &CircuitKey) {
        self.record_outcome(key, false, false);
    }

    /// Apply one request outcome
    ///
    /// While half-open only the trial's outcome moves the state; requests
    /// admitted earlier resolve without effect.
    fn record_outcome(&self, key: &CircuitKey, trial: bool, success: bool) {
        let mut entry = self.circuits.entry(key.clone()).or_default();

        if entry.status == CircuitStatus::HalfOpen && !trial {
            tracing::debug!(circuit = %key, success, "ignoring outcome of a request admitted before the trial");
            return;
        }

        if success {
            match entry.status {
                // A request admitted before the circuit opened; the cooldown stands
                CircuitStatus::Open => {}
                CircuitStatus::HalfOpen => {
                    tracing::info!(circuit = %key, "trial request succeeded, circuit closed");
                    *entry = CircuitEntry::default();
                }
                CircuitStatus::Closed => entry.consecutive_failures = 0,
            }
            return;
        }

        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        match entry.status {
            CircuitStatus::Closed if entry.consecutive_failures >= self.failure_threshold => {
                tracing::warn!(
                    circuit = %key,
                    failures = entry.consecutive_failures,
                    cooldown = ?self.cooldown,
                    "circuit opened"
                );
                entry.status = CircuitStatus::Open;
                entry.opened_at = Some(Instant::now());
            }
            CircuitStatus::HalfOpen => {
                tracing::warn!(circuit = %key, "trial request failed, circuit reopened");
                entry.status = CircuitStatus::Open;
                entry.opened_at = Some(Instant::now());
                entry.trial_in_flight = false;
            }
            CircuitStatus::Closed | CircuitStatus::Open => {}
        }
    }

    /// Current state of `key`; unknown keys are closed
    pub fn status(&self, key: &CircuitKey) -> CircuitStatus {
        self.circuits.get(key).map_or(CircuitStatus::Closed, |entry| entry.status)
    }

    /// Snapshot of `key`
    pub fn snapshot(&self, key: &CircuitKey) -> CircuitSnapshot {
        self.circuits.get(key).map_or_else(
            || CircuitSnapshot {
                key: key.clone(),
                status: CircuitStatus::Closed,
                consecutive_failures: 0,
                opened_at: None,
            },
            |entry| CircuitSnapshot {
                key: key.clone(),
                status: entry.status,
                consecutive_failures: entry.consecutive_failures,
                opened_at: entry.opened_at,
            },
        )
    }

    fn release_trial(&self, key: &CircuitKey) {
        if let Some(mut entry) = self.circuits.get_mut(key)
            && entry.status == CircuitStatus::HalfOpen
        {
            entry.trial_in_flight = false;
        }
    }
}

/// Permission to send one request
///
/// Resolve it with [`succeed`](Self::succeed) or [`fail`](Self::fail).
/// Dropping it unresolved records nothing and frees the half-open trial
/// slot, which is what cancellation and fatal client errors do.
#[derive(Debug)]
pub struct CircuitPermit {
    registry: Arc<CircuitBreakerRegistry>,
    key: CircuitKey,
    trial: bool,
    resolved: bool,
}

impl CircuitPermit {
    /// Whether this permit is the half-open trial
    pub const fn is_trial(&self) -> bool {
        self.trial
    }

    /// The request completed
    pub fn succeed(mut self) {
        self.resolved = true;
        self.registry.record_outcome(&self.key, self.trial, true);
    }

    /// The request failed in a way that counts against the endpoint
    pub fn fail(mut self) {
        self.resolved = true;
        self.registry.record_outcome(&self.key, self.trial, false);
    }
}

impl Drop for CircuitPermit {
    fn drop(&mut self) {
        if self.trial && !self.resolved {
            self.registry.release_trial(&self.key);
        }
    }
}
