use std::fmt;
use std::time::Duration;

use http::StatusCode;
use serde::Serialize;
use strum::Display;
use thiserror::Error;

use crate::attachment::AttachmentError;

/// Stable reason code carried by every failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    /// Timeout, lost connection, premature end of stream
    Network,
    /// Missing or rejected credentials
    Authentication,
    /// Provider rate limit (429)
    RateLimited,
    /// Provider-side failure (5xx, overloaded)
    ServerError,
    /// Unparseable block or payload
    MalformedResponse,
    /// Missing model, bad endpoint, disabled provider
    Configuration,
    /// Provider rejected the request (4xx other than 401/403/429)
    InvalidRequest,
    /// External tool failed
    ToolExecution,
    /// Tool loop safety cutoff
    DepthExceeded,
    /// Endpoint circuit is open
    CircuitOpen,
}

/// Errors raised while talking to a provider
#[derive(Debug, Error)]
pub enum LlmError {
    /// No bytes arrived within the idle timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection could not be established or was lost
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream closed without a terminal event
    #[error("stream ended before completion")]
    StreamEnded,

    /// Credentials missing or rejected
    #[error("authentication failed for provider '{provider}': {message}; check the API key configured for this provider")]
    Authentication {
        /// Provider name
        provider: String,
        /// Redacted upstream message
        message: String,
    },

    /// Provider rate limit hit
    #[error("rate limited: {message}")]
    RateLimited {
        /// Redacted upstream message
        message: String,
        /// Server-provided retry hint
        retry_after: Option<Duration>,
    },

    /// Provider returned a server error
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Redacted upstream message
        message: String,
        /// Server-provided retry hint
        retry_after: Option<Duration>,
    },

    /// Provider rejected the request
    #[error("invalid request ({status}): {message}")]
    InvalidRequest {
        /// HTTP status code
        status: u16,
        /// Redacted upstream message
        message: String,
    },

    /// Payload could not be interpreted
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Configuration problem detected before any network call
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Custom endpoint does not use HTTPS
    #[error("insecure endpoint: {0} (only https is allowed)")]
    InsecureEndpoint(String),

    /// Custom endpoint could not be parsed or is unusable
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Attachment failed validation
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    /// Circuit breaker rejected the request
    #[error("circuit open for {endpoint}; request not sent")]
    CircuitOpen {
        /// Endpoint key
        endpoint: String,
    },

    /// External tool failed
    #[error("tool '{tool}' failed: {message}")]
    ToolExecution {
        /// Tool name
        tool: String,
        /// Failure description
        message: String,
    },

    /// Tool loop ran into its depth limit
    #[error("tool chain depth limit of {0} reached")]
    DepthExceeded(u32),
}

impl LlmError {
    /// Build an error from a non-success HTTP response
    pub fn from_status(provider: &str, status: StatusCode, retry_after: Option<Duration>, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Authentication {
                provider: provider.to_owned(),
                message: format!("{status}: {message}"),
            },
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited { message, retry_after },
            StatusCode::REQUEST_TIMEOUT => Self::Timeout(message),
            s if s.is_server_error() => Self::Server {
                status: s.as_u16(),
                message,
                retry_after,
            },
            s => Self::InvalidRequest {
                status: s.as_u16(),
                message,
            },
        }
    }

    /// Stable reason code
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout(_) | Self::Connection(_) | Self::StreamEnded => ErrorCode::Network,
            Self::Authentication { .. } => ErrorCode::Authentication,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::Server { .. } => ErrorCode::ServerError,
            Self::InvalidRequest { .. } | Self::Attachment(_) => ErrorCode::InvalidRequest,
            Self::MalformedResponse(_) => ErrorCode::MalformedResponse,
            Self::Configuration(_) | Self::InsecureEndpoint(_) | Self::InvalidEndpoint(_) => ErrorCode::Configuration,
            Self::CircuitOpen { .. } => ErrorCode::CircuitOpen,
            Self::ToolExecution { .. } => ErrorCode::ToolExecution,
            Self::DepthExceeded(_) => ErrorCode::DepthExceeded,
        }
    }

    /// Whether a new attempt may succeed
    pub const fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }

    /// Server-provided delay hint
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } | Self::Server { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Convert into the form carried by `failed` events
    pub fn classify(&self) -> ClassifiedError {
        ClassifiedError {
            code: self.code(),
            message: self.to_string(),
            retry_after: self.retry_after(),
            tool_call_id: None,
            tool_name: None,
            block_index: None,
        }
    }
}

impl ErrorCode {
    /// Transient failures worth another attempt
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimited | Self::ServerError)
    }
}

/// Failure as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    /// Stable reason code
    pub code: ErrorCode,
    /// Human-readable, secret-redacted description
    pub message: String,
    /// Server-provided retry hint
    pub retry_after: Option<Duration>,
    /// Tool call this failure is confined to
    pub tool_call_id: Option<String>,
    /// Name of that tool, when the provider sent one
    pub tool_name: Option<String>,
    /// Content block this failure is confined to
    pub block_index: Option<u32>,
}

impl ClassifiedError {
    /// Create an unscoped error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
            tool_call_id: None,
            tool_name: None,
            block_index: None,
        }
    }

    /// Confine the error to one tool call
    #[must_use]
    pub fn with_tool_call(mut self, id: impl Into<String>) -> Self {
        self.tool_call_id = Some(id.into());
        self
    }

    /// Name the tool of a scoped tool call failure
    #[must_use]
    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self
    }

    /// Confine the error to one content block of the response
    #[must_use]
    pub fn with_block(mut self, index: u32) -> Self {
        self.block_index = Some(index);
        self
    }

    /// Whether the error only affects one block, leaving the stream running
    pub const fn is_scoped(&self) -> bool {
        self.tool_call_id.is_some() || self.block_index.is_some()
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<LlmError> for ClassifiedError {
    fn from(error: LlmError) -> Self {
        error.classify()
    }
}
