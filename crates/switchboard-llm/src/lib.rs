//! Streaming inference core for Switchboard
//!
//! Speaks the Chat Completions, Responses and Messages wire dialects,
//! normalizes their server-sent event streams into one event model, drives
//! the model/tool loop, and fans a turn out across several models. Every
//! network call is wrapped in retry classification and a per-endpoint
//! circuit breaker.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod attachment;
pub mod capabilities;
pub mod circuit;
pub mod client;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod orchestrator;
pub mod protocol;
pub mod redact;
pub mod request;
pub mod retry;
pub mod secret;
pub mod stream;
pub mod types;

pub use circuit::{CircuitBreakerRegistry, CircuitKey, CircuitPermit, CircuitSnapshot, CircuitStatus};
pub use client::{ClientContext, ClientSettings, EventStream, ProviderClient};
pub use engine::{Engine, FanOutId, FanOutStream, TurnId, TurnStream};
pub use error::{ClassifiedError, ErrorCode, LlmError};
pub use fanout::KeyedEvent;
pub use orchestrator::{NoTools, ToolError, ToolExecutor, ToolOrchestrator, TurnOutcome};
pub use retry::RetryPolicy;
pub use secret::{ConfigSecretResolver, SecretResolver};
pub use types::{
    Attachment, Message, ModelTarget, NormalizedStreamEvent, ReasoningBlock, Role, StopReason, ToolCall, ToolDefinition,
    WireDialect,
};
