mod harness;

use std::sync::Arc;
use std::time::{Duration, Instant};

use harness::config::{ConfigBuilder, target};
use harness::mock_llm::{MockLlm, Reply};
use harness::{collect, failure, sse, terminals, text};
use switchboard_config::Config;
use switchboard_llm::{CircuitKey, CircuitStatus, Engine, ErrorCode, Message, NoTools};

fn engine(config: &Config) -> Engine {
    Engine::new(config, Arc::new(NoTools)).unwrap()
}

fn circuit(config: &Config, mock: &MockLlm) -> CircuitKey {
    CircuitKey::new(
        format!("{}/chat/completions", mock.base_url()),
        config.client.purpose.as_str(),
    )
}

async fn turn(engine: &Engine, config: &Config) -> Vec<switchboard_llm::NormalizedStreamEvent> {
    collect(engine.start_turn(vec![Message::user("hi")], target(config, "gpt"), Vec::new())).await
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let mock = MockLlm::start(vec![
        Reply::status(500, "boom"),
        Reply::status(503, "busy"),
        Reply::Sse(sse::chat_text(&["ok"])),
    ])
    .await
    .unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("gpt", &mock.base_url())
        .with_max_attempts(3)
        .build();
    let engine = engine(&config);

    let events = turn(&engine, &config).await;

    assert_eq!(text(&events), "ok");
    assert_eq!(failure(&events), None);
    assert_eq!(mock.request_count(), 3);
    assert_eq!(engine.breaker().status(&circuit(&config, &mock)), CircuitStatus::Closed);
}

#[tokio::test]
async fn exhausted_retries_surface_the_last_error() {
    let mock = MockLlm::start(vec![Reply::status(500, "boom")]).await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("gpt", &mock.base_url())
        .with_max_attempts(2)
        .build();
    let engine = engine(&config);

    let events = turn(&engine, &config).await;

    assert_eq!(failure(&events), Some(ErrorCode::ServerError));
    assert_eq!(terminals(&events), 1);
    assert_eq!(mock.request_count(), 2);
}

#[tokio::test]
async fn authentication_failures_are_not_retried() {
    let mock = MockLlm::start(vec![Reply::status(401, "invalid api key")]).await.unwrap();
    let config = ConfigBuilder::new().with_openai_provider("gpt", &mock.base_url()).build();
    let engine = engine(&config);

    let events = turn(&engine, &config).await;

    assert_eq!(failure(&events), Some(ErrorCode::Authentication));
    assert_eq!(mock.request_count(), 1);
    // Fatal client errors say nothing about endpoint health
    let snapshot = engine.breaker().snapshot(&circuit(&config, &mock));
    assert_eq!(snapshot.consecutive_failures, 0);
}

#[tokio::test]
async fn rate_limit_hint_delays_the_retry() {
    let mock = MockLlm::start(vec![Reply::rate_limited("1"), Reply::Sse(sse::chat_text(&["ok"]))])
        .await
        .unwrap();
    let config = ConfigBuilder::new().with_openai_provider("gpt", &mock.base_url()).build();
    let engine = engine(&config);

    let started = Instant::now();
    let events = turn(&engine, &config).await;

    assert_eq!(text(&events), "ok");
    assert_eq!(mock.request_count(), 2);
    assert!(started.elapsed() >= Duration::from_secs(1), "retried after {:?}", started.elapsed());
}

#[tokio::test]
async fn idle_stream_times_out_as_network_error() {
    let mock = MockLlm::start(vec![Reply::Stall(String::new())]).await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("gpt", &mock.base_url())
        .with_idle_timeout(Duration::from_millis(200))
        .with_max_attempts(1)
        .build();
    let engine = engine(&config);

    let events = turn(&engine, &config).await;

    assert_eq!(failure(&events), Some(ErrorCode::Network));
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn open_circuit_fails_fast_without_network() {
    let mock = MockLlm::start(vec![Reply::status(500, "boom")]).await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("gpt", &mock.base_url())
        .with_max_attempts(1)
        .with_circuit_breaker(2, Duration::from_secs(60))
        .build();
    let engine = engine(&config);
    let key = circuit(&config, &mock);

    for _ in 0..2 {
        assert_eq!(failure(&turn(&engine, &config).await), Some(ErrorCode::ServerError));
    }
    assert_eq!(engine.breaker().status(&key), CircuitStatus::Open);

    let events = turn(&engine, &config).await;
    assert_eq!(failure(&events), Some(ErrorCode::CircuitOpen));
    assert_eq!(mock.request_count(), 2);
}

#[tokio::test]
async fn half_open_trial_success_closes_the_circuit() {
    let mock = MockLlm::start(vec![
        Reply::status(500, "boom"),
        Reply::status(500, "boom"),
        Reply::Sse(sse::chat_text(&["back"])),
    ])
    .await
    .unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("gpt", &mock.base_url())
        .with_max_attempts(1)
        .with_circuit_breaker(2, Duration::from_millis(200))
        .build();
    let engine = engine(&config);
    let key = circuit(&config, &mock);

    turn(&engine, &config).await;
    turn(&engine, &config).await;
    assert_eq!(engine.breaker().status(&key), CircuitStatus::Open);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let events = turn(&engine, &config).await;
    assert_eq!(text(&events), "back");
    assert_eq!(engine.breaker().status(&key), CircuitStatus::Closed);
    assert_eq!(mock.request_count(), 3);
}

#[tokio::test]
async fn half_open_trial_failure_reopens_the_circuit() {
    let mock = MockLlm::start(vec![Reply::status(502, "bad gateway")]).await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("gpt", &mock.base_url())
        .with_max_attempts(1)
        .with_circuit_breaker(1, Duration::from_millis(200))
        .build();
    let engine = engine(&config);
    let key = circuit(&config, &mock);

    turn(&engine, &config).await;
    assert_eq!(engine.breaker().status(&key), CircuitStatus::Open);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(failure(&turn(&engine, &config).await), Some(ErrorCode::ServerError));
    assert_eq!(engine.breaker().status(&key), CircuitStatus::Open);

    // Cooldown restarted, so the next call is rejected locally
    assert_eq!(failure(&turn(&engine, &config).await), Some(ErrorCode::CircuitOpen));
    assert_eq!(mock.request_count(), 2);
}
