//! Messages API (hoisted-system) request builder

use http::header::{HeaderName, HeaderValue};
use secrecy::ExposeSecret;

use crate::attachment;
use crate::error::LlmError;
use crate::protocol::messages::{
    MessagesContent, MessagesContentBlock, MessagesImageSource, MessagesMessage, MessagesRequest, MessagesThinking,
    MessagesTool,
};
use crate::types::{Message, ReasoningBlock, Role, WireDialect};

use super::{PreparedRequest, RequestBuilder, RequestInput};

/// API version header value
const API_VERSION: &str = "2023-06-01";

/// Beta flag for thinking between tool calls
const INTERLEAVED_THINKING: &str = "interleaved-thinking-2025-05-14";

/// `max_tokens` is mandatory in this dialect
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Builder for the Messages dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagesRequestBuilder;

impl RequestBuilder for MessagesRequestBuilder {
    fn dialect(&self) -> WireDialect {
        WireDialect::Messages
    }

    fn build(&self, input: &RequestInput<'_>) -> Result<PreparedRequest, LlmError> {
        let model = super::require_model(input.config)?;
        attachment::check_count(input.history, input.limits)?;

        let mut messages: Vec<MessagesMessage> = Vec::with_capacity(input.history.len());
        for message in input.history {
            let Some(converted) = convert_message(message, input)? else {
                continue;
            };
            push_coalesced(&mut messages, converted);
        }

        let tools: Option<Vec<MessagesTool>> = (!input.tools.is_empty()).then(|| {
            input
                .tools
                .iter()
                .map(|tool| MessagesTool {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    input_schema: tool.parameters.clone(),
                })
                .collect()
        });

        let mut max_tokens = input.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let thinking = input.config.thinking_budget.map(|budget_tokens| {
            // The budget must fit inside max_tokens
            if max_tokens <= budget_tokens {
                max_tokens = budget_tokens.saturating_add(DEFAULT_MAX_TOKENS);
            }
            MessagesThinking {
                thinking_type: "enabled",
                budget_tokens,
            }
        });

        let headers = build_headers(input, thinking.is_some() && tools.is_some())?;

        let request = MessagesRequest {
            model,
            max_tokens,
            system: super::joined_system(input.history),
            messages,
            // Sampling parameters are rejected while thinking
            temperature: if thinking.is_some() { None } else { input.config.temperature },
            stream: true,
            tools,
            thinking,
        };

        Ok(PreparedRequest {
            headers,
            body: super::to_body(&request)?,
        })
    }
}

fn build_headers(input: &RequestInput<'_>, interleaved: bool) -> Result<http::HeaderMap, LlmError> {
    let mut headers = http::HeaderMap::new();

    let key = input.api_key.expose_secret();
    if !key.is_empty() {
        headers.insert(HeaderName::from_static("x-api-key"), super::sensitive(key)?);
    }
    headers.insert(
        HeaderName::from_static("anthropic-version"),
        HeaderValue::from_static(API_VERSION),
    );
    if interleaved {
        headers.insert(
            HeaderName::from_static("anthropic-beta"),
            HeaderValue::from_static(INTERLEAVED_THINKING),
        );
    }

    super::apply_extra_headers(&mut headers, input.config)?;
    Ok(headers)
}

fn convert_message(message: &Message, input: &RequestInput<'_>) -> Result<Option<MessagesMessage>, LlmError> {
    let converted = match message.role {
        // Hoisted into `system`
        Role::System => return Ok(None),
        Role::User if message.attachments.is_empty() => MessagesMessage {
            role: "user",
            content: MessagesContent::Text(message.content.clone()),
        },
        Role::User => {
            let mut blocks = Vec::with_capacity(message.attachments.len() + 1);
            if !message.content.is_empty() {
                blocks.push(MessagesContentBlock::Text {
                    text: message.content.clone(),
                });
            }
            for item in &message.attachments {
                let image = attachment::encode(item, input.limits)?;
                blocks.push(MessagesContentBlock::Image {
                    source: MessagesImageSource {
                        source_type: "base64",
                        media_type: image.mime_type,
                        data: image.data,
                    },
                });
            }
            MessagesMessage {
                role: "user",
                content: MessagesContent::Blocks(blocks),
            }
        }
        Role::Assistant => {
            // Signed thinking must lead the turn it was produced in
            let replay: &[ReasoningBlock] = if input.config.thinking_budget.is_some() {
                &message.reasoning_blocks
            } else {
                &[]
            };
            if message.tool_calls.is_empty() && replay.is_empty() {
                MessagesMessage {
                    role: "assistant",
                    content: MessagesContent::Text(message.content.clone()),
                }
            } else {
                let mut blocks = Vec::with_capacity(replay.len() + message.tool_calls.len() + 1);
                blocks.extend(replay.iter().map(|block| match block {
                    ReasoningBlock::Thinking { thinking, signature } => MessagesContentBlock::Thinking {
                        thinking: thinking.clone(),
                        signature: signature.clone(),
                    },
                    ReasoningBlock::Redacted { data } => MessagesContentBlock::RedactedThinking { data: data.clone() },
                }));
                if !message.content.is_empty() {
                    blocks.push(MessagesContentBlock::Text {
                        text: message.content.clone(),
                    });
                }
                blocks.extend(message.tool_calls.iter().map(|call| MessagesContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                }));
                MessagesMessage {
                    role: "assistant",
                    content: MessagesContent::Blocks(blocks),
                }
            }
        }
        // Tool results travel in a user turn
        Role::Tool => {
            if message.tool_calls.is_empty() {
                return Err(super::tool_message_error());
            }
            let blocks = message
                .tool_calls
                .iter()
                .map(|call| MessagesContentBlock::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: call.result.clone().unwrap_or_default(),
                    is_error: call.is_error.then_some(true),
                })
                .collect();
            MessagesMessage {
                role: "user",
                content: MessagesContent::Blocks(blocks),
            }
        }
    };

    Ok(Some(converted))
}

/// Roles must alternate, so adjacent same-role turns are merged
fn push_coalesced(messages: &mut Vec<MessagesMessage>, next: MessagesMessage) {
    match messages.last_mut() {
        Some(last) if last.role == next.role => {
            let previous = std::mem::replace(&mut last.content, MessagesContent::Blocks(Vec::new()));
            let mut blocks = previous.into_blocks();
            blocks.extend(next.content.into_blocks());
            last.content = MessagesContent::Blocks(blocks);
        }
        _ => messages.push(next),
    }
}
