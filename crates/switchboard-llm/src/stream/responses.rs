//! Responses API stream parser

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ClassifiedError;
use crate::protocol::responses::{ResponsesOutputItem, ResponsesStreamEvent, ResponsesStreamResponse};
use crate::types::{NormalizedStreamEvent, StopReason};

use super::blocks::BlockMap;
use super::{StreamParser, Terminal, recover_index, stream_error, undecodable};

fn output_index() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""output_index"\s*:\s*(\d+)"#).expect("must be valid regex"))
}

/// Parser state for one Responses API response
#[derive(Debug, Default)]
pub struct ResponsesStreamParser {
    items: BlockMap,
    terminal: Terminal,
}

impl StreamParser for ResponsesStreamParser {
    fn parse(&mut self, event_type: &str, data: &str) -> Vec<NormalizedStreamEvent> {
        if self.terminal.is_done() {
            return Vec::new();
        }

        let event: ResponsesStreamEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                let index = recover_index(data, "/output_index", output_index());
                return undecodable(&mut self.items, &mut self.terminal, index, event_type, &e);
            }
        };

        match event {
            ResponsesStreamEvent::OutputItemAdded {
                output_index,
                item: ResponsesOutputItem::FunctionCall { call_id, name, arguments },
            } => {
                let block = self.items.tool(output_index);
                block.identify(Some(&call_id), Some(&name));
                block.push(&arguments);
                Vec::new()
            }
            ResponsesStreamEvent::OutputTextDelta { delta, .. } if !delta.is_empty() => {
                vec![NormalizedStreamEvent::TextDelta(delta)]
            }
            ResponsesStreamEvent::ReasoningSummaryTextDelta { delta, .. } if !delta.is_empty() => {
                vec![NormalizedStreamEvent::ReasoningDelta(delta)]
            }
            ResponsesStreamEvent::FunctionCallArgumentsDelta { output_index, delta } => {
                self.items.tool(output_index).push(&delta);
                Vec::new()
            }
            ResponsesStreamEvent::OutputItemDone {
                output_index,
                item: ResponsesOutputItem::FunctionCall { call_id, name, arguments },
            } => {
                let block = self.items.tool(output_index);
                block.identify(Some(&call_id), Some(&name));
                // Servers that skip argument deltas send the whole string here
                if block.is_empty() {
                    block.push(&arguments);
                }
                self.items.close(output_index).into_iter().collect()
            }
            ResponsesStreamEvent::OutputItemDone { output_index, .. } => {
                self.items.close(output_index).into_iter().collect()
            }
            ResponsesStreamEvent::Completed { .. } => {
                let stop = if self.items.saw_tool_use() {
                    StopReason::ToolUseRequested
                } else {
                    StopReason::NaturalEnd
                };
                self.complete(stop)
            }
            ResponsesStreamEvent::Incomplete { response } => {
                let stop = response
                    .incomplete_details
                    .and_then(|details| details.reason)
                    .map_or(StopReason::MaxTokens, |reason| StopReason::from_provider(&reason));
                self.complete(stop)
            }
            ResponsesStreamEvent::Failed { response } => self.terminal.fail(response_error(response)),
            ResponsesStreamEvent::Error { code, message } => {
                self.terminal.fail(stream_error(code.as_deref().unwrap_or_default(), &message))
            }
            _ => Vec::new(),
        }
    }

    fn finish(&mut self) -> Vec<NormalizedStreamEvent> {
        self.terminal.finish(&mut self.items)
    }
}

impl ResponsesStreamParser {
    fn complete(&mut self, stop: StopReason) -> Vec<NormalizedStreamEvent> {
        let mut events = self.items.close_all();
        events.extend(self.terminal.complete(stop));
        events
    }
}

fn response_error(response: ResponsesStreamResponse) -> ClassifiedError {
    match response.error {
        Some(error) => stream_error(error.code.as_deref().unwrap_or_default(), &error.message),
        None => stream_error(
            "",
            &format!("response {}", response.status.as_deref().unwrap_or("failed")),
        ),
    }
}
