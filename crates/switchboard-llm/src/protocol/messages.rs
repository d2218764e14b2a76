//! Messages API (Anthropic) wire format types

use serde::{Deserialize, Serialize};

// -- Request types --

/// Messages API request
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    /// Model identifier
    pub model: String,
    /// Maximum tokens to generate (required)
    pub max_tokens: u32,
    /// System prompt, hoisted out of the message list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Conversation messages
    pub messages: Vec<MessagesMessage>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Always true
    pub stream: bool,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<MessagesTool>>,
    /// Extended thinking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<MessagesThinking>,
}

/// Message with role "user" or "assistant"
#[derive(Debug, Clone, Serialize)]
pub struct MessagesMessage {
    /// Message role
    pub role: &'static str,
    /// Message content
    pub content: MessagesContent,
}

/// Content is a string or an ordered list of blocks
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessagesContent {
    /// Plain text shorthand
    Text(String),
    /// Typed blocks
    Blocks(Vec<MessagesContentBlock>),
}

impl MessagesContent {
    /// Convert into block form
    pub fn into_blocks(self) -> Vec<MessagesContentBlock> {
        match self {
            Self::Text(text) => vec![MessagesContentBlock::Text { text }],
            Self::Blocks(blocks) => blocks,
        }
    }
}

/// Content block in a request message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagesContentBlock {
    /// Text
    Text {
        /// The text string
        text: String,
    },
    /// Image
    Image {
        /// Image source
        source: MessagesImageSource,
    },
    /// Signed thinking from an earlier assistant turn
    Thinking {
        /// Thinking text
        thinking: String,
        /// Signature issued with it
        signature: String,
    },
    /// Withheld thinking from an earlier assistant turn
    RedactedThinking {
        /// Opaque payload
        data: String,
    },
    /// Earlier tool call made by the assistant
    ToolUse {
        /// Tool use identifier
        id: String,
        /// Tool name
        name: String,
        /// Tool input
        input: serde_json::Value,
    },
    /// Result for an earlier tool call
    ToolResult {
        /// Tool use this result answers
        tool_use_id: String,
        /// Result text
        content: String,
        /// Set when the tool failed
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Inline image source
#[derive(Debug, Clone, Serialize)]
pub struct MessagesImageSource {
    /// Always "base64"
    #[serde(rename = "type")]
    pub source_type: &'static str,
    /// Image MIME type
    pub media_type: &'static str,
    /// Base64 payload
    pub data: String,
}

/// Tool definition
#[derive(Debug, Clone, Serialize)]
pub struct MessagesTool {
    /// Tool name
    pub name: String,
    /// Description
    pub description: String,
    /// JSON Schema for input
    pub input_schema: serde_json::Value,
}

/// Extended thinking request
#[derive(Debug, Clone, Serialize)]
pub struct MessagesThinking {
    /// Always "enabled"
    #[serde(rename = "type")]
    pub thinking_type: &'static str,
    /// Token budget for thinking
    pub budget_tokens: u32,
}

// -- Streaming types --

/// SSE event payload, discriminated by its `type` field
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagesStreamEvent {
    /// Stream started
    MessageStart {
        /// Message metadata, unused
        #[serde(default)]
        message: Option<serde_json::Value>,
    },
    /// Content block opened
    ContentBlockStart {
        /// Block index
        index: u32,
        /// Initial block content
        content_block: MessagesStreamBlock,
    },
    /// Content within a block
    ContentBlockDelta {
        /// Block index
        index: u32,
        /// Delta content
        delta: MessagesStreamDelta,
    },
    /// Content block closed
    ContentBlockStop {
        /// Block index
        index: u32,
    },
    /// Message-level update carrying the stop reason
    MessageDelta {
        /// Stop reason delta
        delta: MessagesMessageDelta,
    },
    /// Stream completed
    MessageStop,
    /// Keep-alive
    Ping,
    /// Server-side error
    Error {
        /// Error details
        error: MessagesErrorDetail,
    },
    /// Event types this client does not interpret
    #[serde(other)]
    Other,
}

/// Block skeleton in `content_block_start`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagesStreamBlock {
    /// Text block
    Text {
        /// Initial text (usually empty)
        #[serde(default)]
        text: String,
    },
    /// Thinking block
    Thinking {
        /// Initial thinking (usually empty)
        #[serde(default)]
        thinking: String,
    },
    /// Thinking withheld by the provider, only an opaque payload
    RedactedThinking {
        /// Payload to send back unchanged
        #[serde(default)]
        data: String,
    },
    /// Tool use block
    ToolUse {
        /// Tool use identifier
        id: String,
        /// Tool name
        name: String,
    },
    /// Block kinds this client does not interpret
    #[serde(other)]
    Other,
}

/// Delta in `content_block_delta`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagesStreamDelta {
    /// Text fragment
    TextDelta {
        /// Text fragment
        text: String,
    },
    /// Thinking fragment
    ThinkingDelta {
        /// Thinking fragment
        thinking: String,
    },
    /// Thinking signature, carries no visible content
    SignatureDelta {
        /// Signature fragment
        signature: String,
    },
    /// Tool input JSON fragment
    InputJsonDelta {
        /// JSON fragment
        partial_json: String,
    },
    /// Delta kinds this client does not interpret
    #[serde(other)]
    Other,
}

/// Delta in `message_delta`
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesMessageDelta {
    /// Stop reason
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Error detail
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesErrorDetail {
    /// Error type, e.g. `overloaded_error`
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message
    #[serde(default)]
    pub message: String,
}
