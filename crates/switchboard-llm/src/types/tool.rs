use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provider-neutral tool definition
///
/// Callers always supply the flat function shape; each request builder
/// renders it into its dialect's schema form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for the arguments
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a tool definition
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Tool invocation requested by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier assigned by the provider
    pub id: String,
    /// Tool name
    pub name: String,
    /// Fully assembled arguments
    pub arguments: Value,
    /// Output from the tool executor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Whether `result` describes a failed execution
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCall {
    /// Create a pending call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            result: None,
            is_error: false,
        }
    }

    /// Attach a successful result
    #[must_use]
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self.is_error = false;
        self
    }

    /// Attach an error result the model can react to
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.result = Some(message.into());
        self.is_error = true;
        self
    }

    /// Result text as sent to dialects without a native error flag
    pub fn result_text(&self) -> String {
        let result = self.result.as_deref().unwrap_or_default();
        if self.is_error {
            format!("Error: {result}")
        } else {
            result.to_owned()
        }
    }
}
