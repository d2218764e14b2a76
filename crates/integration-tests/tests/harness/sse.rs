//! Canned server-sent event bodies for each wire dialect

use serde_json::{Value, json};

fn frame(data: &Value) -> String {
    format!("data: {data}\n\n")
}

fn named(event: &str, data: &Value) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}

/// Chat Completions text response
pub fn chat_text(fragments: &[&str]) -> String {
    let mut body: String = fragments
        .iter()
        .map(|text| frame(&json!({"choices": [{"index": 0, "delta": {"content": text}}]})))
        .collect();
    body.push_str(&frame(&json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]})));
    body.push_str("data: [DONE]\n\n");
    body
}

/// Chat Completions text fragments with no terminal chunk
pub fn chat_truncated(fragments: &[&str]) -> String {
    fragments
        .iter()
        .map(|text| frame(&json!({"choices": [{"index": 0, "delta": {"content": text}}]})))
        .collect()
}

/// Chat Completions tool call split into argument fragments
pub fn chat_tool_call(id: &str, name: &str, fragments: &[&str]) -> String {
    let mut body = frame(&json!({
        "choices": [{
            "index": 0,
            "delta": {"tool_calls": [{"index": 0, "id": id, "type": "function", "function": {"name": name, "arguments": ""}}]}
        }]
    }));
    for fragment in fragments {
        body.push_str(&frame(&json!({
            "choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": fragment}}]}}]
        })));
    }
    body.push_str(&frame(&json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]})));
    body.push_str("data: [DONE]\n\n");
    body
}

/// Messages text response with a thinking block first
pub fn messages_text(thinking: &str, fragments: &[&str]) -> String {
    let mut body = named("message_start", &json!({"type": "message_start", "message": {"id": "msg_1"}}));
    body.push_str(&named(
        "content_block_start",
        &json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": ""}}),
    ));
    body.push_str(&named(
        "content_block_delta",
        &json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": thinking}}),
    ));
    body.push_str(&named("content_block_stop", &json!({"type": "content_block_stop", "index": 0})));
    body.push_str(&named(
        "content_block_start",
        &json!({"type": "content_block_start", "index": 1, "content_block": {"type": "text", "text": ""}}),
    ));
    for text in fragments {
        body.push_str(&named(
            "content_block_delta",
            &json!({"type": "content_block_delta", "index": 1, "delta": {"type": "text_delta", "text": text}}),
        ));
    }
    body.push_str(&named("content_block_stop", &json!({"type": "content_block_stop", "index": 1})));
    body.push_str(&named(
        "message_delta",
        &json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}}),
    ));
    body.push_str(&named("message_stop", &json!({"type": "message_stop"})));
    body
}

/// Messages tool call preceded by signed thinking
pub fn messages_tool_call(thinking: &str, signature: &str, id: &str, name: &str, input: &str) -> String {
    let mut body = named(
        "content_block_start",
        &json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": ""}}),
    );
    body.push_str(&named(
        "content_block_delta",
        &json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": thinking}}),
    ));
    body.push_str(&named(
        "content_block_delta",
        &json!({"type": "content_block_delta", "index": 0, "delta": {"type": "signature_delta", "signature": signature}}),
    ));
    body.push_str(&named("content_block_stop", &json!({"type": "content_block_stop", "index": 0})));
    body.push_str(&named(
        "content_block_start",
        &json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": id, "name": name, "input": {}}}),
    ));
    body.push_str(&named(
        "content_block_delta",
        &json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": input}}),
    ));
    body.push_str(&named("content_block_stop", &json!({"type": "content_block_stop", "index": 1})));
    body.push_str(&named(
        "message_delta",
        &json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}}),
    ));
    body.push_str(&named("message_stop", &json!({"type": "message_stop"})));
    body
}

/// Responses text response
pub fn responses_text(fragments: &[&str]) -> String {
    let mut body: String = fragments
        .iter()
        .map(|text| {
            named(
                "response.output_text.delta",
                &json!({"type": "response.output_text.delta", "output_index": 0, "delta": text}),
            )
        })
        .collect();
    body.push_str(&named(
        "response.completed",
        &json!({"type": "response.completed", "response": {"status": "completed"}}),
    ));
    body
}
