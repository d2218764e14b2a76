//! Chat Completions wire format types

use serde::{Deserialize, Serialize};

// -- Request types --

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages, system prompt included
    pub messages: Vec<ChatMessage>,
    /// Always true
    pub stream: bool,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Reasoning effort for reasoning models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatTool>>,
    /// Stream options (`include_usage`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<ChatStreamOptions>,
}

/// Stream options
#[derive(Debug, Clone, Serialize)]
pub struct ChatStreamOptions {
    /// Append a usage chunk before `[DONE]`
    pub include_usage: bool,
}

/// Message within a request
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Message role
    pub role: &'static str,
    /// Message content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ChatContent>,
    /// Tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    /// Call answered by a tool message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Content is either a string or typed parts
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChatContent {
    /// Plain text
    Text(String),
    /// Text and image parts
    Parts(Vec<ChatContentPart>),
}

/// Typed content part
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatContentPart {
    /// Text part
    Text {
        /// The text string
        text: String,
    },
    /// Image part
    ImageUrl {
        /// Image location
        image_url: ChatImageUrl,
    },
}

/// Image location, a `data:` URI here
#[derive(Debug, Clone, Serialize)]
pub struct ChatImageUrl {
    /// URL or data URI
    pub url: String,
}

/// Tool definition
#[derive(Debug, Clone, Serialize)]
pub struct ChatTool {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    /// Function schema
    pub function: ChatFunction,
}

/// Function schema
#[derive(Debug, Clone, Serialize)]
pub struct ChatFunction {
    /// Function name
    pub name: String,
    /// Description
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

/// Tool call within an assistant message
#[derive(Debug, Clone, Serialize)]
pub struct ChatToolCall {
    /// Call identifier
    pub id: String,
    /// Always "function"
    #[serde(rename = "type")]
    pub call_type: &'static str,
    /// Function invocation
    pub function: ChatFunctionCall,
}

/// Function invocation with arguments as a JSON string
#[derive(Debug, Clone, Serialize)]
pub struct ChatFunctionCall {
    /// Function name
    pub name: String,
    /// Arguments encoded as JSON text
    pub arguments: String,
}

// -- Streaming types --

/// One `data:` chunk of a streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamChunk {
    /// Choices in this chunk
    #[serde(default)]
    pub choices: Vec<ChatStreamChoice>,
    /// Mid-stream error reported by some gateways
    #[serde(default)]
    pub error: Option<ChatStreamError>,
}

/// Choice within a stream chunk
#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,
    /// Incremental content
    #[serde(default)]
    pub delta: ChatStreamDelta,
    /// Reason generation finished
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental content in a stream chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatStreamDelta {
    /// Text content
    #[serde(default)]
    pub content: Option<String>,
    /// Reasoning text (`DeepSeek` style)
    #[serde(default)]
    pub reasoning_content: Option<String>,
    /// Reasoning text (`OpenRouter` style)
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Tool call fragments
    #[serde(default)]
    pub tool_calls: Vec<ChatStreamToolCall>,
}

/// Tool call fragment
#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamToolCall {
    /// Position of this call in the response
    #[serde(default)]
    pub index: u32,
    /// Call identifier (first fragment only)
    #[serde(default)]
    pub id: Option<String>,
    /// Function fragment
    #[serde(default)]
    pub function: Option<ChatStreamFunctionCall>,
}

/// Function fragment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatStreamFunctionCall {
    /// Function name (first fragment only)
    #[serde(default)]
    pub name: Option<String>,
    /// Arguments JSON fragment
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Error object embedded in a chunk
#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamError {
    /// Error message
    #[serde(default)]
    pub message: String,
    /// Error type
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    /// Error code, string or number depending on the server
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}
