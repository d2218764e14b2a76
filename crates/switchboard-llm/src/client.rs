//! One provider, one "send and stream" operation
//!
//! A request runs as its own task: check the circuit breaker, send, feed
//! the SSE body through the dialect's parser and forward every normalized
//! event as soon as it is produced. Transient failures are retried while
//! nothing has reached the caller yet.

use std::fmt;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use secrecy::SecretString;
use switchboard_config::{Config, ProviderConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::attachment::AttachmentLimits;
use crate::capabilities::capabilities;
use crate::circuit::{CircuitBreakerRegistry, CircuitKey};
use crate::endpoint::{EndpointPolicy, EndpointResolver};
use crate::error::{ClassifiedError, LlmError};
use crate::redact::redact;
use crate::request::{PreparedRequest, RequestInput, builder_for};
use crate::retry::{self, Disposition, RetryPolicy};
use crate::secret::SecretResolver;
use crate::stream::{parser_for, sse};
use crate::types::{Message, NormalizedStreamEvent, ToolDefinition, WireDialect};

/// Events buffered between the request task and its consumer
const EVENT_BUFFER: usize = 64;

/// Longest upstream error text kept in a failure message
const MAX_ERROR_CHARS: usize = 300;

/// Per-request transport settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Maximum silence before a request counts as timed out
    pub idle_timeout: Duration,
    /// Purpose label folded into circuit keys
    pub purpose: String,
    /// Attachment ceilings
    pub limits: AttachmentLimits,
    /// Endpoint transport rules
    pub endpoint_policy: EndpointPolicy,
}

impl ClientSettings {
    /// Settings from configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            idle_timeout: config.client.idle_timeout,
            purpose: config.client.purpose.clone(),
            limits: AttachmentLimits::from(&config.attachments),
            endpoint_policy: EndpointPolicy::from(&config.client),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Collaborators shared by every provider client of an engine
#[derive(Clone)]
pub struct ClientContext {
    /// HTTP client
    pub http: reqwest::Client,
    /// Shared breaker registry
    pub breaker: Arc<CircuitBreakerRegistry>,
    /// Retry policy
    pub retry: RetryPolicy,
    /// API key source
    pub secrets: Arc<dyn SecretResolver>,
    /// Transport settings
    pub settings: ClientSettings,
}

impl ClientContext {
    /// Build a context from configuration
    pub fn new(config: &Config, secrets: Arc<dyn SecretResolver>) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.client.connect_timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            breaker: Arc::new(CircuitBreakerRegistry::new(&config.circuit_breaker)),
            retry: RetryPolicy::from_config(&config.retry),
            secrets,
            settings: ClientSettings::from_config(config),
        })
    }
}

impl fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContext")
            .field("retry", &self.retry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Normalized events of one request, in parser order
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<NormalizedStreamEvent>,
}

impl Stream for EventStream {
    type Item = NormalizedStreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Client for one configured provider
#[derive(Debug)]
pub struct ProviderClient {
    name: String,
    config: ProviderConfig,
    dialect: WireDialect,
    endpoint: Url,
    circuit: CircuitKey,
    context: ClientContext,
}

/// Request with the key kept for redaction
struct Prepared {
    request: PreparedRequest,
    api_key: SecretString,
}

/// How one attempt ended
enum Attempt {
    Completed,
    Failed { error: ClassifiedError, emitted: bool },
    Cancelled,
    ReceiverGone,
}

impl ProviderClient {
    /// Create a client, resolving the endpoint up front
    pub fn new(name: impl Into<String>, config: ProviderConfig, context: ClientContext) -> Result<Self, LlmError> {
        let name = name.into();

        if !capabilities().is_enabled(config.kind) {
            return Err(LlmError::Configuration(format!(
                "provider type '{}' is not available in this build",
                config.kind
            )));
        }

        let dialect = WireDialect::for_kind(config.kind);
        let endpoint =
            EndpointResolver::new(context.settings.endpoint_policy).resolve(config.kind, config.base_url.as_deref())?;
        let circuit = CircuitKey::new(endpoint.as_str(), context.settings.purpose.as_str());

        tracing::debug!(provider = %name, %dialect, endpoint = %endpoint, "provider client ready");

        Ok(Self {
            name,
            config,
            dialect,
            endpoint,
            circuit,
            context,
        })
    }

    /// Configured provider name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire dialect
    pub const fn dialect(&self) -> WireDialect {
        self.dialect
    }

    /// Resolved request URL
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Circuit breaker key
    pub const fn circuit_key(&self) -> &CircuitKey {
        &self.circuit
    }

    /// Send `history` and stream the response
    ///
    /// The stream ends after one terminal event, or silently when `cancel`
    /// fires.
    pub fn stream(
        self: &Arc<Self>,
        history: Vec<Message>,
        tools: Vec<ToolDefinition>,
        cancel: CancellationToken,
    ) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let client = Arc::clone(self);
        tokio::spawn(async move {
            client.run(&history, &tools, &cancel, &tx).await;
        });
        EventStream { rx }
    }

    async fn run(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
        cancel: &CancellationToken,
        tx: &mpsc::Sender<NormalizedStreamEvent>,
    ) {
        let prepared = match self.prepare(history, tools) {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!(provider = %self.name, error = %e, "request rejected before sending");
                let _ = tx.send(NormalizedStreamEvent::Failed(e.classify())).await;
                return;
            }
        };

        let mut attempts: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return;
            }

            let Some(permit) = self.context.breaker.check_permission(&self.circuit) else {
                let error = LlmError::CircuitOpen {
                    endpoint: self.endpoint.to_string(),
                };
                tracing::warn!(provider = %self.name, circuit = %self.circuit, "circuit open, failing fast");
                let _ = tx.send(NormalizedStreamEvent::Failed(error.classify())).await;
                return;
            };

            attempts += 1;
            tracing::debug!(provider = %self.name, attempt = attempts, trial = permit.is_trial(), "sending request");

            match self.attempt(&prepared, cancel, tx).await {
                Attempt::Completed => {
                    permit.succeed();
                    return;
                }
                // Dropping the permit records nothing
                Attempt::Cancelled | Attempt::ReceiverGone => return,
                Attempt::Failed { error, emitted } => {
                    let retryable = RetryPolicy::classify(&error) == Disposition::Retryable;
                    if retryable {
                        permit.fail();
                    } else {
                        drop(permit);
                    }

                    if retryable && !emitted && self.context.retry.allows_retry(attempts) {
                        let delay = self.context.retry.delay_for(&error, attempts - 1);
                        tracing::info!(
                            provider = %self.name,
                            attempt = attempts,
                            code = %error.code,
                            delay = ?delay,
                            "transient failure, retrying"
                        );
                        tokio::select! {
                            () = cancel.cancelled() => return,
                            () = tokio::time::sleep(delay) => {}
                        }
                        continue;
                    }

                    tracing::warn!(
                        provider = %self.name,
                        attempt = attempts,
                        code = %error.code,
                        error = %error.message,
                        "request failed"
                    );
                    let _ = tx.send(NormalizedStreamEvent::Failed(error)).await;
                    return;
                }
            }
        }
    }

    fn prepare(&self, history: &[Message], tools: &[ToolDefinition]) -> Result<Prepared, LlmError> {
        let api_key = self.context.secrets.api_key(&self.name, &self.config)?;
        let input = RequestInput {
            history,
            tools,
            config: &self.config,
            endpoint: &self.endpoint,
            api_key: &api_key,
            limits: self.context.settings.limits,
        };
        let request = builder_for(self.dialect).build(&input)?;
        Ok(Prepared { request, api_key })
    }

    async fn attempt(
        &self,
        prepared: &Prepared,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<NormalizedStreamEvent>,
    ) -> Attempt {
        let idle = self.context.settings.idle_timeout;
        let send = self
            .context
            .http
            .post(self.endpoint.clone())
            .headers(prepared.request.headers.clone())
            .json(&prepared.request.body)
            .send();

        let response = tokio::select! {
            () = cancel.cancelled() => return Attempt::Cancelled,
            result = tokio::time::timeout(idle, send) => match result {
                Err(_) => return failed(&LlmError::Timeout("no response within idle timeout".to_owned())),
                Ok(Err(e)) => return failed(&transport_error(&e, &prepared.api_key)),
                Ok(Ok(response)) => response,
            },
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry::retry_after(response.headers());
            let body = tokio::select! {
                () = cancel.cancelled() => return Attempt::Cancelled,
                body = tokio::time::timeout(idle, response.text()) => body.ok().and_then(Result::ok).unwrap_or_default(),
            };
            tracing::debug!(provider = %self.name, status = %status, "upstream returned error status");
            let message = error_message(&body, &prepared.api_key);
            return failed(&LlmError::from_status(&self.name, status, retry_after, message));
        }

        let mut parser = parser_for(self.dialect);
        let mut records = pin!(response.bytes_stream().eventsource());
        let mut emitted = false;
        let mut ended = false;

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => return Attempt::Cancelled,
                next = tokio::time::timeout(idle, records.next()) => next,
            };

            let events = match next {
                Err(_) => {
                    return Attempt::Failed {
                        error: LlmError::Timeout(format!("no data for {idle:?}")).classify(),
                        emitted,
                    };
                }
                Ok(Some(Err(e))) => {
                    return Attempt::Failed {
                        error: LlmError::Connection(redact(&e.to_string(), Some(&prepared.api_key))).classify(),
                        emitted,
                    };
                }
                Ok(Some(Ok(record))) => {
                    if cancel.is_cancelled() {
                        return Attempt::Cancelled;
                    }
                    sse::dispatch(parser.as_mut(), &record)
                }
                Ok(None) => {
                    ended = true;
                    parser.finish()
                }
            };

            for event in events {
                match event {
                    NormalizedStreamEvent::Failed(error) if !error.is_scoped() => {
                        return Attempt::Failed { error, emitted };
                    }
                    NormalizedStreamEvent::Completed(reason) => {
                        if tx.send(NormalizedStreamEvent::Completed(reason)).await.is_err() {
                            return Attempt::ReceiverGone;
                        }
                        return Attempt::Completed;
                    }
                    event => {
                        if tx.send(event).await.is_err() {
                            return Attempt::ReceiverGone;
                        }
                        emitted = true;
                    }
                }
            }

            if ended {
                return Attempt::Failed {
                    error: LlmError::StreamEnded.classify(),
                    emitted,
                };
            }
        }
    }
}

fn failed(error: &LlmError) -> Attempt {
    Attempt::Failed {
        error: error.classify(),
        emitted: false,
    }
}

fn transport_error(error: &reqwest::Error, api_key: &SecretString) -> LlmError {
    let message = redact(&error.to_string(), Some(api_key));
    if error.is_timeout() {
        LlmError::Timeout(message)
    } else {
        LlmError::Connection(message)
    }
}

/// Human-readable, redacted text from an upstream error body
fn error_message(body: &str, api_key: &SecretString) -> String {
    let text = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            let error = value.get("error").unwrap_or(&value);
            error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .or_else(|| error.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.trim().to_owned());

    let redacted = redact(&text, Some(api_key));
    if redacted.chars().count() > MAX_ERROR_CHARS {
        let mut truncated: String = redacted.chars().take(MAX_ERROR_CHARS).collect();
        truncated.push('…');
        truncated
    } else {
        redacted
    }
}
