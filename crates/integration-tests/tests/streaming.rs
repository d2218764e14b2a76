mod harness;

use std::sync::Arc;

use harness::config::{ConfigBuilder, target};
use harness::mock_llm::MockLlm;
use harness::{collect, failure, sse, terminals, text};
use switchboard_config::ProviderKind;
use switchboard_llm::{Engine, ErrorCode, Message, NoTools, NormalizedStreamEvent, StopReason};

fn engine(config: &switchboard_config::Config) -> Engine {
    Engine::new(config, Arc::new(NoTools)).unwrap()
}

#[tokio::test]
async fn chat_completions_text_streams_in_order() {
    let mock = MockLlm::streaming(sse::chat_text(&["Hel", "lo", " world"])).await.unwrap();
    let config = ConfigBuilder::new().with_openai_provider("gpt", &mock.base_url()).build();
    let engine = engine(&config);

    let events = collect(engine.start_turn(vec![Message::user("hi")], target(&config, "gpt"), Vec::new())).await;

    assert_eq!(
        events,
        vec![
            NormalizedStreamEvent::TextDelta("Hel".into()),
            NormalizedStreamEvent::TextDelta("lo".into()),
            NormalizedStreamEvent::TextDelta(" world".into()),
            NormalizedStreamEvent::Completed(StopReason::NaturalEnd),
        ]
    );

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "/v1/chat/completions");
    assert_eq!(requests[0].1["model"], "gpt-model");
    assert_eq!(requests[0].1["stream"], true);
}

#[tokio::test]
async fn messages_reasoning_precedes_text() {
    let mock = MockLlm::streaming(sse::messages_text("thinking...", &["An", "swer"])).await.unwrap();
    let config = ConfigBuilder::new()
        .with_provider("claude", ProviderKind::Anthropic, &mock.base_url())
        .build();
    let engine = engine(&config);

    let history = vec![Message::system("be brief"), Message::user("hi")];
    let events = collect(engine.start_turn(history, target(&config, "claude"), Vec::new())).await;

    assert_eq!(events[0], NormalizedStreamEvent::ReasoningDelta("thinking...".into()));
    assert_eq!(text(&events), "Answer");
    assert_eq!(events.last(), Some(&NormalizedStreamEvent::Completed(StopReason::NaturalEnd)));

    let (path, body) = &mock.requests()[0];
    assert_eq!(path, "/v1/messages");
    assert_eq!(body["system"], "be brief");
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn responses_text_completes() {
    let mock = MockLlm::streaming(sse::responses_text(&["Hi", "!"])).await.unwrap();
    let config = ConfigBuilder::new()
        .with_provider("gpt5", ProviderKind::OpenaiResponses, &mock.base_url())
        .build();
    let engine = engine(&config);

    let events = collect(engine.start_turn(vec![Message::user("hi")], target(&config, "gpt5"), Vec::new())).await;

    assert_eq!(text(&events), "Hi!");
    assert_eq!(events.last(), Some(&NormalizedStreamEvent::Completed(StopReason::NaturalEnd)));
    assert_eq!(mock.requests()[0].0, "/v1/responses");
}

#[tokio::test]
async fn premature_end_fails_after_partial_text() {
    let mock = MockLlm::streaming(sse::chat_truncated(&["partial"])).await.unwrap();
    let config = ConfigBuilder::new().with_openai_provider("gpt", &mock.base_url()).build();
    let engine = engine(&config);

    let events = collect(engine.start_turn(vec![Message::user("hi")], target(&config, "gpt"), Vec::new())).await;

    assert_eq!(text(&events), "partial");
    assert_eq!(failure(&events), Some(ErrorCode::Network));
    assert_eq!(terminals(&events), 1);
    // Text was already delivered, so the request is not repeated
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn plain_http_to_remote_hosts_is_rejected_before_sending() {
    let config = ConfigBuilder::new()
        .with_openai_provider("gpt", "http://example.com/v1")
        .build();
    let engine = engine(&config);

    let events = collect(engine.start_turn(vec![Message::user("hi")], target(&config, "gpt"), Vec::new())).await;

    assert_eq!(events.len(), 1);
    assert_eq!(failure(&events), Some(ErrorCode::Configuration));
}
