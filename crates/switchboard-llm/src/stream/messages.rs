//! Messages API stream parser
//!
//! Content arrives in indexed blocks bracketed by `content_block_start`
//! and `content_block_stop`. The stop reason comes in `message_delta` and
//! the response ends with `message_stop`.

use std::sync::OnceLock;

use regex::Regex;

use crate::protocol::messages::{MessagesStreamBlock, MessagesStreamDelta, MessagesStreamEvent};
use crate::types::{NormalizedStreamEvent, StopReason};

use super::blocks::{BlockKind, BlockMap};
use super::{StreamParser, Terminal, recover_index, stream_error, undecodable};

fn block_index() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""index"\s*:\s*(\d+)"#).expect("must be valid regex"))
}

/// Parser state for one Messages API response
#[derive(Debug, Default)]
pub struct MessagesStreamParser {
    blocks: BlockMap,
    terminal: Terminal,
}

impl StreamParser for MessagesStreamParser {
    fn parse(&mut self, event_type: &str, data: &str) -> Vec<NormalizedStreamEvent> {
        if self.terminal.is_done() {
            return Vec::new();
        }

        let event: MessagesStreamEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                let index = recover_index(data, "/index", block_index());
                return undecodable(&mut self.blocks, &mut self.terminal, index, event_type, &e);
            }
        };

        match event {
            MessagesStreamEvent::MessageStart { .. } | MessagesStreamEvent::Ping => Vec::new(),
            MessagesStreamEvent::ContentBlockStart { index, content_block } => self.start_block(index, content_block),
            MessagesStreamEvent::ContentBlockDelta { index, delta } => self.apply_delta(index, delta),
            MessagesStreamEvent::ContentBlockStop { index } => self.blocks.close(index).into_iter().collect(),
            MessagesStreamEvent::MessageDelta { delta } => {
                if let Some(reason) = delta.stop_reason {
                    self.terminal.note_stop(StopReason::from_provider(&reason));
                }
                Vec::new()
            }
            MessagesStreamEvent::MessageStop => {
                let mut events = self.blocks.close_all();
                let stop = self.terminal.stop.unwrap_or(StopReason::NaturalEnd);
                events.extend(self.terminal.complete(stop));
                events
            }
            MessagesStreamEvent::Error { error } => self.terminal.fail(stream_error(&error.error_type, &error.message)),
            MessagesStreamEvent::Other => {
                tracing::debug!(event_type, "ignoring messages event of unknown type");
                Vec::new()
            }
        }
    }

    fn finish(&mut self) -> Vec<NormalizedStreamEvent> {
        self.terminal.finish(&mut self.blocks)
    }
}

impl MessagesStreamParser {
    fn start_block(&mut self, index: u32, block: MessagesStreamBlock) -> Vec<NormalizedStreamEvent> {
        match block {
            MessagesStreamBlock::Text { text } => {
                self.blocks.open(index, BlockKind::Text);
                non_empty(text, NormalizedStreamEvent::TextDelta)
            }
            MessagesStreamBlock::Thinking { thinking } => {
                self.blocks.open(index, BlockKind::Reasoning);
                non_empty(thinking, NormalizedStreamEvent::ReasoningDelta)
            }
            MessagesStreamBlock::RedactedThinking { data } => {
                self.blocks.open_redacted(index, data);
                Vec::new()
            }
            MessagesStreamBlock::ToolUse { id, name } => {
                self.blocks.tool(index).identify(Some(&id), Some(&name));
                Vec::new()
            }
            MessagesStreamBlock::Other => {
                tracing::debug!(index, "ignoring content block of unknown type");
                Vec::new()
            }
        }
    }

    fn apply_delta(&mut self, index: u32, delta: MessagesStreamDelta) -> Vec<NormalizedStreamEvent> {
        match delta {
            MessagesStreamDelta::TextDelta { text } => {
                self.blocks.append(index, &text);
                non_empty(text, NormalizedStreamEvent::TextDelta)
            }
            MessagesStreamDelta::ThinkingDelta { thinking } => {
                self.blocks.append(index, &thinking);
                non_empty(thinking, NormalizedStreamEvent::ReasoningDelta)
            }
            MessagesStreamDelta::InputJsonDelta { partial_json } => {
                let kind = self.blocks.append(index, &partial_json);
                if kind != Some(BlockKind::ToolUse) {
                    tracing::debug!(index, ?kind, "input JSON for a block that is not a tool call");
                }
                Vec::new()
            }
            MessagesStreamDelta::SignatureDelta { signature } => {
                self.blocks.sign(index, &signature);
                Vec::new()
            }
            MessagesStreamDelta::Other => Vec::new(),
        }
    }
}

fn non_empty(text: String, wrap: fn(String) -> NormalizedStreamEvent) -> Vec<NormalizedStreamEvent> {
    if text.is_empty() { Vec::new() } else { vec![wrap(text)] }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorCode;
    use crate::stream::sse::tests::parse_every_split;
    use crate::types::{ReasoningBlock, WireDialect};

    fn sse(events: &[&str]) -> String {
        events
            .iter()
            .map(|data| {
                let value: serde_json::Value = serde_json::from_str(data).unwrap();
                format!("event: {}\ndata: {data}\n\n", value["type"].as_str().unwrap())
            })
            .collect()
    }

    #[tokio::test]
    async fn text_response() {
        let body = sse(&[
            r#"{"type":"message_start","message":{"id":"msg_1","role":"assistant","content":[]}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":" there"}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":2}}"#,
            r#"{"type":"message_stop"}"#,
        ]);
        let events = parse_every_split(WireDialect::Messages, &body).await;

        assert_eq!(
            events,
            [
                NormalizedStreamEvent::TextDelta("Hello".to_owned()),
                NormalizedStreamEvent::TextDelta(" there".to_owned()),
                NormalizedStreamEvent::Completed(StopReason::NaturalEnd),
            ]
        );
    }

    #[tokio::test]
    async fn thinking_then_tool_use() {
        let body = sse(&[
            r#"{"type":"message_start","message":{}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"Need to search."}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"signature_delta","signature":"EqQB"}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"search","input":{}}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":""}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"q\": \"ru"}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"st\"}"}}"#,
            r#"{"type":"content_block_stop","index":1}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"}}"#,
            r#"{"type":"message_stop"}"#,
        ]);
        let events = parse_every_split(WireDialect::Messages, &body).await;

        assert_eq!(
            events,
            [
                NormalizedStreamEvent::ReasoningDelta("Need to search.".to_owned()),
                NormalizedStreamEvent::ReasoningSealed(ReasoningBlock::Thinking {
                    thinking: "Need to search.".to_owned(),
                    signature: "EqQB".to_owned(),
                }),
                NormalizedStreamEvent::ToolCallRequested {
                    id: "toolu_1".to_owned(),
                    name: "search".to_owned(),
                    arguments: json!({"q": "rust"}),
                },
                NormalizedStreamEvent::Completed(StopReason::ToolUseRequested),
            ]
        );
    }

    #[tokio::test]
    async fn tool_without_input_gets_empty_object() {
        let body = sse(&[
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_2","name":"now","input":{}}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"}}"#,
            r#"{"type":"message_stop"}"#,
        ]);
        let events = parse_every_split(WireDialect::Messages, &body).await;

        assert!(matches!(
            &events[0],
            NormalizedStreamEvent::ToolCallRequested { arguments, .. } if *arguments == json!({})
        ));
    }

    #[tokio::test]
    async fn redacted_thinking_is_kept_but_not_shown() {
        let body = sse(&[
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"redacted_thinking","data":"opaque"}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"text","text":"ok"}}"#,
            r#"{"type":"content_block_stop","index":1}"#,
            r#"{"type":"message_stop"}"#,
        ]);
        let events = parse_every_split(WireDialect::Messages, &body).await;

        assert_eq!(
            events,
            [
                NormalizedStreamEvent::ReasoningSealed(ReasoningBlock::Redacted {
                    data: "opaque".to_owned(),
                }),
                NormalizedStreamEvent::TextDelta("ok".to_owned()),
                NormalizedStreamEvent::Completed(StopReason::NaturalEnd),
            ]
        );
    }

    #[tokio::test]
    async fn overloaded_error_is_server_error() {
        let body = sse(&[
            r#"{"type":"message_start","message":{}}"#,
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        ]);
        let events = parse_every_split(WireDialect::Messages, &body).await;

        let [NormalizedStreamEvent::Failed(error)] = events.as_slice() else {
            panic!("expected one failure, got {events:?}");
        };
        assert_eq!(error.code, ErrorCode::ServerError);
        assert!(error.code.is_retryable());
    }

    #[tokio::test]
    async fn stream_cut_before_message_stop() {
        let body = sse(&[
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"half"}}"#,
        ]);
        let events = parse_every_split(WireDialect::Messages, &body).await;

        assert_eq!(events[0], NormalizedStreamEvent::TextDelta("half".to_owned()));
        assert!(matches!(&events[1], NormalizedStreamEvent::Failed(e) if e.code == ErrorCode::Network));
    }

    #[tokio::test]
    async fn stop_reason_without_message_stop_completes() {
        let body = sse(&[
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":"done"}}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"max_tokens"}}"#,
        ]);
        let events = parse_every_split(WireDialect::Messages, &body).await;
        assert_eq!(events.last(), Some(&NormalizedStreamEvent::Completed(StopReason::MaxTokens)));
    }

    #[tokio::test]
    async fn undecodable_records_are_reported_not_dropped() {
        let body = [
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"A"}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"B"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"t1","name":"search","input":{}}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"q\": \"ru"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"}"}}"#,
            r#"{"type":"content_block_stop","index":1}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"}}"#,
            r#"{"type":"message_stop"}"#,
        ]
        .iter()
        .map(|data| format!("data: {data}\n\n"))
        .collect::<String>();
        let events = parse_every_split(WireDialect::Messages, &body).await;

        assert_eq!(events.len(), 4, "{events:?}");
        assert_eq!(events[0], NormalizedStreamEvent::TextDelta("A".to_owned()));

        let NormalizedStreamEvent::Failed(lost_text) = &events[1] else {
            panic!("expected lost text to be reported, got {events:?}");
        };
        assert_eq!(lost_text.code, ErrorCode::MalformedResponse);
        assert_eq!(lost_text.block_index, Some(0));
        assert!(lost_text.is_scoped());

        let NormalizedStreamEvent::Failed(lost_call) = &events[2] else {
            panic!("expected the tool call to fail, got {events:?}");
        };
        assert_eq!(lost_call.code, ErrorCode::MalformedResponse);
        assert_eq!(lost_call.tool_call_id.as_deref(), Some("t1"));

        assert_eq!(events[3], NormalizedStreamEvent::Completed(StopReason::ToolUseRequested));
    }

    #[tokio::test]
    async fn undecodable_record_outside_any_block_fails_the_response() {
        let body = [
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":"hi"}}"#,
            r#"{"type":"message_delta","delta":{"stop_rea"#,
            r#"{"type":"message_stop"}"#,
        ]
        .iter()
        .map(|data| format!("data: {data}\n\n"))
        .collect::<String>();
        let events = parse_every_split(WireDialect::Messages, &body).await;

        assert_eq!(events[0], NormalizedStreamEvent::TextDelta("hi".to_owned()));
        let [_, NormalizedStreamEvent::Failed(error)] = events.as_slice() else {
            panic!("expected a terminal failure, got {events:?}");
        };
        assert_eq!(error.code, ErrorCode::MalformedResponse);
        assert!(!error.is_scoped());
    }

    #[tokio::test]
    async fn unknown_event_types_are_ignored() {
        let body = sse(&[
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":"ok"}}"#,
            r#"{"type":"usage_report","tokens":12}"#,
            r#"{"type":"message_stop"}"#,
        ]);
        let events = parse_every_split(WireDialect::Messages, &body).await;

        assert_eq!(
            events,
            [
                NormalizedStreamEvent::TextDelta("ok".to_owned()),
                NormalizedStreamEvent::Completed(StopReason::NaturalEnd),
            ]
        );
    }
}
