//! Chat Completions (flat-history) request builder

use crate::attachment;
use crate::error::LlmError;
use crate::protocol::chat::{
    ChatContent, ChatContentPart, ChatFunction, ChatFunctionCall, ChatImageUrl, ChatMessage, ChatRequest,
    ChatStreamOptions, ChatTool, ChatToolCall,
};
use crate::types::{Message, Role, WireDialect};

use super::{PreparedRequest, RequestBuilder, RequestInput};

/// Only the canonical host understands `stream_options`
const USAGE_HOST: &str = "api.openai.com";

/// Builder for the Chat Completions dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatRequestBuilder;

impl RequestBuilder for ChatRequestBuilder {
    fn dialect(&self) -> WireDialect {
        WireDialect::ChatCompletions
    }

    fn build(&self, input: &RequestInput<'_>) -> Result<PreparedRequest, LlmError> {
        let model = super::require_model(input.config)?;
        attachment::check_count(input.history, input.limits)?;

        let mut messages = Vec::with_capacity(input.history.len());
        for message in input.history {
            convert_message(message, input, &mut messages)?;
        }

        let tools = (!input.tools.is_empty()).then(|| {
            input
                .tools
                .iter()
                .map(|tool| ChatTool {
                    tool_type: "function",
                    function: ChatFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect()
        });

        let stream_options = (input.endpoint.host_str() == Some(USAGE_HOST)).then_some(ChatStreamOptions {
            include_usage: true,
        });

        let request = ChatRequest {
            model,
            messages,
            stream: true,
            temperature: input.config.temperature,
            max_tokens: input.config.max_tokens,
            reasoning_effort: input.config.reasoning_effort.as_ref().map(ToString::to_string),
            tools,
            stream_options,
        };

        let mut headers = super::bearer_headers(input.api_key)?;
        super::apply_extra_headers(&mut headers, input.config)?;

        Ok(PreparedRequest {
            headers,
            body: super::to_body(&request)?,
        })
    }
}

fn convert_message(message: &Message, input: &RequestInput<'_>, out: &mut Vec<ChatMessage>) -> Result<(), LlmError> {
    match message.role {
        Role::System => out.push(text_message("system", &message.content)),
        Role::User if message.attachments.is_empty() => out.push(text_message("user", &message.content)),
        Role::User => {
            let mut parts = Vec::with_capacity(message.attachments.len() + 1);
            if !message.content.is_empty() {
                parts.push(ChatContentPart::Text {
                    text: message.content.clone(),
                });
            }
            for item in &message.attachments {
                let image = attachment::encode(item, input.limits)?;
                parts.push(ChatContentPart::ImageUrl {
                    image_url: ChatImageUrl { url: image.data_uri() },
                });
            }
            out.push(ChatMessage {
                role: "user",
                content: Some(ChatContent::Parts(parts)),
                tool_calls: None,
                tool_call_id: None,
            });
        }
        Role::Assistant => {
            let tool_calls = (!message.tool_calls.is_empty()).then(|| {
                message
                    .tool_calls
                    .iter()
                    .map(|call| ChatToolCall {
                        id: call.id.clone(),
                        call_type: "function",
                        function: ChatFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect()
            });
            let content = (!message.content.is_empty() || tool_calls.is_none())
                .then(|| ChatContent::Text(message.content.clone()));
            out.push(ChatMessage {
                role: "assistant",
                content,
                tool_calls,
                tool_call_id: None,
            });
        }
        Role::Tool => {
            if message.tool_calls.is_empty() {
                return Err(super::tool_message_error());
            }
            for call in &message.tool_calls {
                out.push(ChatMessage {
                    role: "tool",
                    content: Some(ChatContent::Text(call.result_text())),
                    tool_calls: None,
                    tool_call_id: Some(call.id.clone()),
                });
            }
        }
    }

    Ok(())
}

fn text_message(role: &'static str, content: &str) -> ChatMessage {
    ChatMessage {
        role,
        content: Some(ChatContent::Text(content.to_owned())),
        tool_calls: None,
        tool_call_id: None,
    }
}
