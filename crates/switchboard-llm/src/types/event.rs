use serde_json::Value;
use strum::Display;

use super::message::ReasoningBlock;
use crate::error::ClassifiedError;

/// Unit of streamed progress, identical across wire dialects
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedStreamEvent {
    /// Visible text fragment
    TextDelta(String),
    /// Reasoning or thinking fragment
    ReasoningDelta(String),
    /// Closed reasoning block that must be replayed with the next request
    ///
    /// Consumed by the tool loop; turn streams never yield it.
    ReasoningSealed(ReasoningBlock),
    /// Tool call whose arguments have been fully assembled
    ToolCallRequested {
        /// Call identifier
        id: String,
        /// Tool name
        name: String,
        /// Parsed arguments
        arguments: Value,
    },
    /// Response finished
    Completed(StopReason),
    /// Request failed, or one block was malformed when the error is
    /// scoped to a tool call or block index
    Failed(ClassifiedError),
}

impl NormalizedStreamEvent {
    /// Whether no further events follow this one for the same request
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Completed(_) => true,
            Self::Failed(error) => !error.is_scoped(),
            _ => false,
        }
    }
}

/// Why a response stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    /// Model finished its answer
    NaturalEnd,
    /// Model is waiting for tool results
    ToolUseRequested,
    /// Output token limit reached
    MaxTokens,
    /// A configured stop sequence matched
    StopSequence,
}

impl StopReason {
    /// Map a provider's stop or finish reason
    pub fn from_provider(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" | "completed" => Self::NaturalEnd,
            "tool_calls" | "function_call" | "tool_use" => Self::ToolUseRequested,
            "length" | "max_tokens" | "max_output_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            other => {
                tracing::debug!(reason = other, "unmapped stop reason, treating as natural end");
                Self::NaturalEnd
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn provider_reasons_map_to_stop_reasons() {
        assert_eq!(StopReason::from_provider("end_turn"), StopReason::NaturalEnd);
        assert_eq!(StopReason::from_provider("tool_calls"), StopReason::ToolUseRequested);
        assert_eq!(StopReason::from_provider("tool_use"), StopReason::ToolUseRequested);
        assert_eq!(StopReason::from_provider("length"), StopReason::MaxTokens);
        assert_eq!(StopReason::from_provider("max_output_tokens"), StopReason::MaxTokens);
        assert_eq!(StopReason::from_provider("stop_sequence"), StopReason::StopSequence);
        assert_eq!(StopReason::from_provider("refusal"), StopReason::NaturalEnd);
    }

    #[test]
    fn scoped_failures_are_not_terminal() {
        let scoped = ClassifiedError::new(ErrorCode::MalformedResponse, "bad json").with_tool_call("call_1");
        assert!(!NormalizedStreamEvent::Failed(scoped).is_terminal());
        let lost_text = ClassifiedError::new(ErrorCode::MalformedResponse, "lost record").with_block(2);
        assert!(!NormalizedStreamEvent::Failed(lost_text).is_terminal());

        let fatal = ClassifiedError::new(ErrorCode::ServerError, "overloaded");
        assert!(NormalizedStreamEvent::Failed(fatal).is_terminal());
        assert!(NormalizedStreamEvent::Completed(StopReason::NaturalEnd).is_terminal());
    }
}
