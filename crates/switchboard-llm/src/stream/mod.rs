//! Incremental SSE parsing into normalized events
//!
//! Each dialect has its own parser. A parser instance belongs to exactly one
//! request; tool-call arguments are buffered per content block and parsed
//! only when that block closes.

mod blocks;
pub mod chat;
pub mod messages;
pub mod responses;
pub mod sse;

use regex::Regex;
use serde_json::Value;

use crate::error::{ClassifiedError, ErrorCode, LlmError};
use crate::redact::redact;
use crate::types::{NormalizedStreamEvent, StopReason, WireDialect};

use self::blocks::{BlockKind, BlockMap};

/// Turns SSE records of one response into normalized events
pub trait StreamParser: Send {
    /// Handle one record; `data` is never empty
    fn parse(&mut self, event_type: &str, data: &str) -> Vec<NormalizedStreamEvent>;

    /// Handle end of the byte stream
    ///
    /// Emits the terminal event if the response has not produced one yet.
    fn finish(&mut self) -> Vec<NormalizedStreamEvent>;
}

/// Fresh parser for a dialect
pub fn parser_for(dialect: WireDialect) -> Box<dyn StreamParser> {
    match dialect {
        WireDialect::ChatCompletions => Box::new(chat::ChatStreamParser::default()),
        WireDialect::Responses => Box::new(responses::ResponsesStreamParser::default()),
        WireDialect::Messages => Box::new(messages::MessagesStreamParser::default()),
    }
}

/// Tracks the single terminal event of a response
#[derive(Debug, Default)]
struct Terminal {
    stop: Option<StopReason>,
    done: bool,
}

impl Terminal {
    const fn is_done(&self) -> bool {
        self.done
    }

    const fn note_stop(&mut self, reason: StopReason) {
        self.stop = Some(reason);
    }

    fn complete(&mut self, reason: StopReason) -> Option<NormalizedStreamEvent> {
        if self.done {
            return None;
        }
        self.done = true;
        Some(NormalizedStreamEvent::Completed(reason))
    }

    fn fail(&mut self, error: ClassifiedError) -> Vec<NormalizedStreamEvent> {
        if self.done {
            return Vec::new();
        }
        self.done = true;
        vec![NormalizedStreamEvent::Failed(error)]
    }

    /// End of input: complete if a stop reason was seen, otherwise the
    /// stream was cut short
    fn finish(&mut self, blocks: &mut BlockMap) -> Vec<NormalizedStreamEvent> {
        if self.done {
            return Vec::new();
        }
        match self.stop {
            Some(reason) => {
                let mut events = blocks.close_all();
                events.extend(self.complete(reason));
                events
            }
            None => self.fail(LlmError::StreamEnded.classify()),
        }
    }
}

/// Block index of a record that failed to decode
///
/// Tries `pointer` on a lenient JSON parse first, then `pattern` on the raw
/// text for payloads cut off mid-way.
fn recover_index(data: &str, pointer: &str, pattern: &Regex) -> Option<u32> {
    let from_json = serde_json::from_str::<Value>(data)
        .ok()
        .and_then(|value| value.pointer(pointer).and_then(Value::as_u64));
    let index = from_json.or_else(|| {
        pattern
            .captures(data)
            .and_then(|captures| captures.get(1))
            .and_then(|index| index.as_str().parse().ok())
    })?;
    u32::try_from(index).ok()
}

/// Handle a record that could not be decoded
///
/// A tool call that lost a fragment fails when its block closes. Lost text
/// or reasoning is reported at once, scoped to its block. A record that
/// cannot be tied to a block fails the response.
fn undecodable(
    blocks: &mut BlockMap,
    terminal: &mut Terminal,
    index: Option<u32>,
    event_type: &str,
    error: &serde_json::Error,
) -> Vec<NormalizedStreamEvent> {
    tracing::warn!(event_type, index = ?index, error = %error, "undecodable stream record");

    match index {
        Some(index) if blocks.corrupt(index) == Some(BlockKind::ToolUse) => Vec::new(),
        Some(index) => vec![NormalizedStreamEvent::Failed(
            ClassifiedError::new(
                ErrorCode::MalformedResponse,
                format!("content of block {index} was lost: {error}"),
            )
            .with_block(index),
        )],
        None => terminal.fail(ClassifiedError::new(
            ErrorCode::MalformedResponse,
            format!("stream record could not be decoded: {error}"),
        )),
    }
}

/// Classify an error reported inside the stream
fn stream_error(kind: &str, message: &str) -> ClassifiedError {
    let code = if kind.contains("rate_limit") {
        ErrorCode::RateLimited
    } else if kind.contains("authentication") || kind.contains("permission") {
        ErrorCode::Authentication
    } else if kind.contains("invalid_request") || kind.contains("not_found") {
        ErrorCode::InvalidRequest
    } else {
        // overloaded_error, api_error, server_error and unknown kinds
        ErrorCode::ServerError
    };

    let message = if kind.is_empty() {
        redact(message, None)
    } else {
        redact(&format!("{kind}: {message}"), None)
    };

    ClassifiedError::new(code, message)
}
