//! Chat Completions stream parser
//!
//! Text and reasoning arrive as plain deltas. Tool calls arrive as
//! fragments keyed by their position in the response and are assembled
//! when the choice reports a finish reason.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ClassifiedError;
use crate::protocol::chat::{ChatStreamChunk, ChatStreamDelta, ChatStreamError};
use crate::types::{NormalizedStreamEvent, StopReason};

use super::blocks::BlockMap;
use super::{StreamParser, Terminal, recover_index, stream_error, undecodable};

/// End-of-stream sentinel
const DONE: &str = "[DONE]";

fn tool_call_index() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""tool_calls"\s*:\s*\[\s*\{\s*"index"\s*:\s*(\d+)"#).expect("must be valid regex")
    })
}

/// Parser state for one Chat Completions response
#[derive(Debug, Default)]
pub struct ChatStreamParser {
    tools: BlockMap,
    terminal: Terminal,
}

impl StreamParser for ChatStreamParser {
    fn parse(&mut self, event_type: &str, data: &str) -> Vec<NormalizedStreamEvent> {
        if self.terminal.is_done() {
            return Vec::new();
        }

        let data = data.trim();
        if data == DONE {
            return self.done();
        }

        let chunk: ChatStreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                let index = recover_index(data, "/choices/0/delta/tool_calls/0/index", tool_call_index());
                if let Some(index) = index {
                    // Later fragments of the call land in the same slot
                    self.tools.tool(index);
                }
                return undecodable(&mut self.tools, &mut self.terminal, index, event_type, &e);
            }
        };

        if let Some(error) = chunk.error {
            return self.terminal.fail(chunk_error(&error));
        }

        let mut events = Vec::new();
        // Only one choice is ever requested
        for choice in chunk.choices.into_iter().filter(|choice| choice.index == 0) {
            self.apply_delta(choice.delta, &mut events);

            if let Some(reason) = choice.finish_reason {
                events.extend(self.tools.close_all());
                let mut stop = StopReason::from_provider(&reason);
                if self.tools.saw_tool_use() && stop == StopReason::NaturalEnd {
                    stop = StopReason::ToolUseRequested;
                }
                self.terminal.note_stop(stop);
            }
        }
        events
    }

    fn finish(&mut self) -> Vec<NormalizedStreamEvent> {
        self.terminal.finish(&mut self.tools)
    }
}

impl ChatStreamParser {
    fn apply_delta(&mut self, delta: ChatStreamDelta, events: &mut Vec<NormalizedStreamEvent>) {
        if let Some(reasoning) = delta.reasoning_content.or(delta.reasoning)
            && !reasoning.is_empty()
        {
            events.push(NormalizedStreamEvent::ReasoningDelta(reasoning));
        }

        if let Some(content) = delta.content
            && !content.is_empty()
        {
            events.push(NormalizedStreamEvent::TextDelta(content));
        }

        for fragment in delta.tool_calls {
            let block = self.tools.tool(fragment.index);
            let function = fragment.function.unwrap_or_default();
            block.identify(fragment.id.as_deref(), function.name.as_deref());
            if let Some(arguments) = function.arguments {
                block.push(&arguments);
            }
        }
    }

    fn done(&mut self) -> Vec<NormalizedStreamEvent> {
        let mut events = self.tools.close_all();
        let stop = self.terminal.stop.unwrap_or(if self.tools.saw_tool_use() {
            StopReason::ToolUseRequested
        } else {
            StopReason::NaturalEnd
        });
        events.extend(self.terminal.complete(stop));
        events
    }
}

fn chunk_error(error: &ChatStreamError) -> ClassifiedError {
    let kind = match (&error.error_type, &error.code) {
        (Some(kind), _) => kind.clone(),
        (None, Some(serde_json::Value::String(code))) => code.clone(),
        (None, Some(code)) => code.to_string(),
        (None, None) => String::new(),
    };
    stream_error(&kind, &error.message)
}
