//! Request construction per wire dialect

pub mod chat;
pub mod messages;
pub mod responses;

use http::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use switchboard_config::ProviderConfig;
use url::Url;

use crate::attachment::AttachmentLimits;
use crate::error::LlmError;
use crate::types::{Message, ToolDefinition, WireDialect};

/// Everything a builder needs for one request
#[derive(Debug, Clone, Copy)]
pub struct RequestInput<'a> {
    /// Conversation so far
    pub history: &'a [Message],
    /// Tools offered to the model
    pub tools: &'a [ToolDefinition],
    /// Provider configuration
    pub config: &'a ProviderConfig,
    /// Resolved request URL
    pub endpoint: &'a Url,
    /// API key, empty for unauthenticated local servers
    pub api_key: &'a SecretString,
    /// Attachment ceilings
    pub limits: AttachmentLimits,
}

/// Transport-ready request
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// Headers, auth values marked sensitive
    pub headers: HeaderMap,
    /// JSON body
    pub body: serde_json::Value,
}

/// Translates the unified data model into one dialect's request
pub trait RequestBuilder: Send + Sync {
    /// Dialect produced by this builder
    fn dialect(&self) -> WireDialect;

    /// Render the request body and headers
    fn build(&self, input: &RequestInput<'_>) -> Result<PreparedRequest, LlmError>;
}

/// Builder for a dialect
pub fn builder_for(dialect: WireDialect) -> &'static dyn RequestBuilder {
    match dialect {
        WireDialect::ChatCompletions => &chat::ChatRequestBuilder,
        WireDialect::Responses => &responses::ResponsesRequestBuilder,
        WireDialect::Messages => &messages::MessagesRequestBuilder,
    }
}

/// Fail before any network call when the model is missing
fn require_model(config: &ProviderConfig) -> Result<String, LlmError> {
    let model = config.model.trim();
    if model.is_empty() {
        return Err(LlmError::Configuration("model must not be empty".to_owned()));
    }
    Ok(model.to_owned())
}

fn to_body<T: Serialize>(request: &T) -> Result<serde_json::Value, LlmError> {
    serde_json::to_value(request).map_err(|e| LlmError::Configuration(format!("failed to encode request: {e}")))
}

fn sensitive(value: &str) -> Result<HeaderValue, LlmError> {
    let mut value =
        HeaderValue::try_from(value).map_err(|_| LlmError::Configuration("API key is not a valid header value".to_owned()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// `Authorization: Bearer` header, skipped for an empty key
fn bearer_headers(api_key: &SecretString) -> Result<HeaderMap, LlmError> {
    let mut headers = HeaderMap::new();
    let key = api_key.expose_secret();
    if !key.is_empty() {
        headers.insert(AUTHORIZATION, sensitive(&format!("Bearer {key}"))?);
    }
    Ok(headers)
}

/// Merge configured extra headers, which override built-in ones
fn apply_extra_headers(headers: &mut HeaderMap, config: &ProviderConfig) -> Result<(), LlmError> {
    for (name, value) in &config.headers {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|e| LlmError::Configuration(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::try_from(value.as_str())
            .map_err(|e| LlmError::Configuration(format!("invalid value for header '{name}': {e}")))?;
        headers.insert(name, value);
    }
    Ok(())
}

/// Join every system message into one instruction block
fn joined_system(history: &[Message]) -> Option<String> {
    let parts: Vec<&str> = history
        .iter()
        .filter(|m| m.role == crate::types::Role::System)
        .map(|m| m.content.as_str())
        .filter(|content| !content.trim().is_empty())
        .collect();

    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

fn tool_message_error() -> LlmError {
    LlmError::Configuration("tool message does not reference a tool call".to_owned())
}
