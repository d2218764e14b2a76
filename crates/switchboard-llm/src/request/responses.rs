//! Responses API request builder

use crate::attachment;
use crate::error::LlmError;
use crate::protocol::responses::{
    ResponsesContent, ResponsesInputItem, ResponsesReasoning, ResponsesRequest, ResponsesTool,
};
use crate::types::{Message, Role, WireDialect};

use super::{PreparedRequest, RequestBuilder, RequestInput};

/// Builder for the Responses dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponsesRequestBuilder;

impl RequestBuilder for ResponsesRequestBuilder {
    fn dialect(&self) -> WireDialect {
        WireDialect::Responses
    }

    fn build(&self, input: &RequestInput<'_>) -> Result<PreparedRequest, LlmError> {
        let model = super::require_model(input.config)?;
        attachment::check_count(input.history, input.limits)?;

        let mut items = Vec::with_capacity(input.history.len());
        for message in input.history {
            convert_message(message, input, &mut items)?;
        }

        let tools = (!input.tools.is_empty()).then(|| {
            input
                .tools
                .iter()
                .map(|tool| ResponsesTool {
                    tool_type: "function",
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                })
                .collect()
        });

        let reasoning = input.config.reasoning_effort.map(|effort| ResponsesReasoning {
            effort: effort.to_string(),
            summary: "auto",
        });

        let request = ResponsesRequest {
            model,
            input: items,
            instructions: super::joined_system(input.history),
            stream: true,
            store: false,
            temperature: input.config.temperature,
            max_output_tokens: input.config.max_tokens,
            tools,
            reasoning,
        };

        let mut headers = super::bearer_headers(input.api_key)?;
        super::apply_extra_headers(&mut headers, input.config)?;

        Ok(PreparedRequest {
            headers,
            body: super::to_body(&request)?,
        })
    }
}

fn convert_message(
    message: &Message,
    input: &RequestInput<'_>,
    out: &mut Vec<ResponsesInputItem>,
) -> Result<(), LlmError> {
    match message.role {
        // Hoisted into `instructions`
        Role::System => {}
        Role::User => {
            let mut content = Vec::with_capacity(message.attachments.len() + 1);
            if !message.content.is_empty() || message.attachments.is_empty() {
                content.push(ResponsesContent::InputText {
                    text: message.content.clone(),
                });
            }
            for item in &message.attachments {
                let image = attachment::encode(item, input.limits)?;
                content.push(ResponsesContent::InputImage {
                    image_url: image.data_uri(),
                });
            }
            out.push(ResponsesInputItem::Message { role: "user", content });
        }
        Role::Assistant => {
            if !message.content.is_empty() {
                out.push(ResponsesInputItem::Message {
                    role: "assistant",
                    content: vec![ResponsesContent::OutputText {
                        text: message.content.clone(),
                    }],
                });
            }
            out.extend(message.tool_calls.iter().map(|call| ResponsesInputItem::FunctionCall {
                call_id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            }));
        }
        Role::Tool => {
            if message.tool_calls.is_empty() {
                return Err(super::tool_message_error());
            }
            out.extend(message.tool_calls.iter().map(|call| ResponsesInputItem::FunctionCallOutput {
                call_id: call.id.clone(),
                output: call.result_text(),
            }));
        }
    }

    Ok(())
}
