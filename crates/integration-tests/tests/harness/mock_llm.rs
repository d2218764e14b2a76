//! Scripted model backend for integration tests
//!
//! Accepts POSTs on any path and answers each request with the next
//! scripted [`Reply`]. The last reply repeats once the script runs out.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum Reply {
    /// Stream this SSE body
    Sse(String),
    /// Stream this SSE body one event at a time with a pause between events
    SlowSse { body: String, pause: Duration },
    /// Fail with a status code
    Status {
        status: u16,
        body: String,
        retry_after: Option<String>,
    },
    /// Send this prefix, then keep the connection open without sending more
    Stall(String),
}

impl Reply {
    /// Plain status failure with an OpenAI-style error body
    pub fn status(status: u16, message: &str) -> Self {
        Self::Status {
            status,
            body: serde_json::json!({"error": {"message": message}}).to_string(),
            retry_after: None,
        }
    }

    /// 429 carrying a `retry-after` header
    pub fn rate_limited(retry_after: &str) -> Self {
        Self::Status {
            status: 429,
            body: serde_json::json!({"error": {"message": "slow down"}}).to_string(),
            retry_after: Some(retry_after.to_owned()),
        }
    }
}

/// Mock backend serving a fixed script
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

struct MockLlmState {
    script: Vec<Reply>,
    request_count: AtomicUsize,
    requests: Mutex<Vec<(String, Value)>>,
}

impl MockLlm {
    /// Start a backend answering with `script`
    pub async fn start(script: Vec<Reply>) -> anyhow::Result<Self> {
        anyhow::ensure!(!script.is_empty(), "script needs at least one reply");

        let state = Arc::new(MockLlmState {
            script,
            request_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Start a backend that always streams `body`
    pub async fn streaming(body: String) -> anyhow::Result<Self> {
        Self::start(vec![Reply::Sse(body)]).await
    }

    /// Base URL for a provider configuration
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of requests received
    pub fn request_count(&self) -> usize {
        self.state.request_count.load(Ordering::SeqCst)
    }

    /// Path and JSON body of every request received
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.state.requests.lock().expect("requests lock").clone()
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(State(state): State<Arc<MockLlmState>>, uri: axum::http::Uri, Json(body): Json<Value>) -> Response {
    let n = state.request_count.fetch_add(1, Ordering::SeqCst);
    state
        .requests
        .lock()
        .expect("requests lock")
        .push((uri.path().to_owned(), body));

    let reply = state.script[n.min(state.script.len() - 1)].clone();
    match reply {
        Reply::Sse(body) => event_stream(Body::from(body)),
        Reply::SlowSse { body, pause } => {
            let frames: Vec<String> = body.split_inclusive("\n\n").map(str::to_owned).collect();
            let stream = futures::stream::iter(frames).then(move |frame| async move {
                tokio::time::sleep(pause).await;
                Ok::<_, Infallible>(Bytes::from(frame))
            });
            event_stream(Body::from_stream(stream))
        }
        Reply::Status {
            status,
            body,
            retry_after,
        } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let mut response = (status, [(header::CONTENT_TYPE, "application/json")], body).into_response();
            if let Some(value) = retry_after {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, value.parse().expect("valid header value"));
            }
            response
        }
        Reply::Stall(prefix) => {
            let stream = futures::stream::once(async move { Ok::<_, Infallible>(Bytes::from(prefix)) })
                .chain(futures::stream::pending());
            event_stream(Body::from_stream(stream))
        }
    }
}

fn event_stream(body: Body) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/event-stream"), (header::CACHE_CONTROL, "no-cache")],
        body,
    )
        .into_response()
}
