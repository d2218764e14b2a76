//! `OpenAI` Responses API wire format types

use serde::{Deserialize, Serialize};

// -- Request types --

/// Responses API request
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesRequest {
    /// Model identifier
    pub model: String,
    /// Conversation items
    pub input: Vec<ResponsesInputItem>,
    /// System instructions hoisted out of the history
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Always true
    pub stream: bool,
    /// Never persist responses server-side
    pub store: bool,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum output tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ResponsesTool>>,
    /// Reasoning options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ResponsesReasoning>,
}

/// Item in the `input` array
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesInputItem {
    /// User or assistant message
    Message {
        /// Message role
        role: &'static str,
        /// Content parts
        content: Vec<ResponsesContent>,
    },
    /// Earlier tool call made by the model
    FunctionCall {
        /// Call identifier
        call_id: String,
        /// Function name
        name: String,
        /// Arguments encoded as JSON text
        arguments: String,
    },
    /// Result for an earlier tool call
    FunctionCallOutput {
        /// Call identifier
        call_id: String,
        /// Tool output
        output: String,
    },
}

/// Content part of an input message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesContent {
    /// User text
    InputText {
        /// The text string
        text: String,
    },
    /// User image
    InputImage {
        /// Data URI
        image_url: String,
    },
    /// Earlier assistant text
    OutputText {
        /// The text string
        text: String,
    },
}

/// Flat function tool definition
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesTool {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    /// Function name
    pub name: String,
    /// Description
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

/// Reasoning options
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesReasoning {
    /// Effort level
    pub effort: String,
    /// Summary mode, "auto" to stream summaries
    pub summary: &'static str,
}

// -- Streaming types --

/// Streaming event, discriminated by its `type` field
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    /// New output item
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        /// Position in the output array
        output_index: u32,
        /// Item skeleton
        item: ResponsesOutputItem,
    },
    /// Output item finished
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        /// Position in the output array
        output_index: u32,
        /// Completed item
        item: ResponsesOutputItem,
    },
    /// Visible text fragment
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        /// Position in the output array
        output_index: u32,
        /// Text fragment
        delta: String,
    },
    /// Reasoning summary fragment
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryTextDelta {
        /// Position in the output array
        output_index: u32,
        /// Text fragment
        delta: String,
    },
    /// Tool argument fragment
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        /// Position in the output array
        output_index: u32,
        /// JSON fragment
        delta: String,
    },
    /// Response finished normally
    #[serde(rename = "response.completed")]
    Completed {
        /// Final response
        response: ResponsesStreamResponse,
    },
    /// Response stopped early
    #[serde(rename = "response.incomplete")]
    Incomplete {
        /// Final response
        response: ResponsesStreamResponse,
    },
    /// Response failed
    #[serde(rename = "response.failed")]
    Failed {
        /// Final response
        response: ResponsesStreamResponse,
    },
    /// Stream-level error
    #[serde(rename = "error")]
    Error {
        /// Error code
        #[serde(default)]
        code: Option<String>,
        /// Error message
        #[serde(default)]
        message: String,
    },
    /// Lifecycle and bookkeeping events that carry nothing to forward
    #[serde(other)]
    Other,
}

/// Output item
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesOutputItem {
    /// Tool call
    FunctionCall {
        /// Call identifier used in follow-up input
        call_id: String,
        /// Function name
        name: String,
        /// Arguments, complete on `output_item.done`
        #[serde(default)]
        arguments: String,
    },
    /// Message, reasoning and other item kinds
    #[serde(other)]
    Other,
}

/// Response object attached to terminal events
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsesStreamResponse {
    /// Response status
    #[serde(default)]
    pub status: Option<String>,
    /// Why the response is incomplete
    #[serde(default)]
    pub incomplete_details: Option<ResponsesIncompleteDetails>,
    /// Failure details
    #[serde(default)]
    pub error: Option<ResponsesErrorDetail>,
}

/// Incomplete details
#[derive(Debug, Clone, Deserialize)]
pub struct ResponsesIncompleteDetails {
    /// Reason, e.g. `max_output_tokens`
    #[serde(default)]
    pub reason: Option<String>,
}

/// Failure details
#[derive(Debug, Clone, Deserialize)]
pub struct ResponsesErrorDetail {
    /// Error code
    #[serde(default)]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: String,
}
