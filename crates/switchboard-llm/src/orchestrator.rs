//! Model/tool loop for one conversation turn
//!
//! ```text
//! AwaitingModel -> Streaming -> ToolRequested -> ExecutingTool -> AwaitingModel
//!                            \-> Completed
//!                            \-> Failed
//! ```
//!
//! Tool calls from one model response run one at a time, in the order the
//! model requested them. Every result is appended to the history before
//! the model is asked again. Calls whose arguments arrived malformed are
//! answered with an error result instead of being run.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{Map, Value};
use strum::Display;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::ProviderClient;
use crate::error::{ClassifiedError, ErrorCode, LlmError};
use crate::types::{Message, NormalizedStreamEvent, ReasoningBlock, StopReason, ToolCall, ToolDefinition};

/// Failure reported by a tool executor
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ToolError {
    /// Message shown to the model
    pub message: String,
}

impl ToolError {
    /// Create an error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Performs the side effect behind a tool call
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run `name` with `arguments`, returning text for the model
    async fn execute(&self, name: &str, arguments: &Value) -> Result<String, ToolError>;
}

/// Executor that offers no tools
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTools;

#[async_trait]
impl ToolExecutor for NoTools {
    async fn execute(&self, name: &str, _arguments: &Value) -> Result<String, ToolError> {
        Err(ToolError::new(format!("unknown tool '{name}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
enum TurnPhase {
    AwaitingModel,
    Streaming,
    ToolRequested,
    ExecutingTool,
    Completed,
    Failed,
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model finished
    Completed(StopReason),
    /// The turn failed with this reason
    Failed(ErrorCode),
    /// The turn was cancelled or its consumer went away
    Cancelled,
}

/// Drives one turn against one provider
pub struct ToolOrchestrator {
    client: Arc<ProviderClient>,
    executor: Arc<dyn ToolExecutor>,
    max_chain_depth: u32,
}

/// What one model round produced
#[derive(Default)]
struct Round {
    text: String,
    reasoning: String,
    sealed: Vec<ReasoningBlock>,
    calls: Vec<ToolCall>,
    rejected: Vec<ToolCall>,
    stop: Option<StopReason>,
}

impl ToolOrchestrator {
    /// Create an orchestrator
    pub fn new(client: Arc<ProviderClient>, executor: Arc<dyn ToolExecutor>, max_chain_depth: u32) -> Self {
        Self {
            client,
            executor,
            max_chain_depth,
        }
    }

    /// Provider this orchestrator talks to
    pub fn client(&self) -> &ProviderClient {
        &self.client
    }

    /// Run the turn, forwarding events to `tx`
    ///
    /// Intermediate `Completed(ToolUseRequested)` events are consumed here;
    /// the consumer sees exactly one terminal event, or none when cancelled.
    pub async fn run(
        &self,
        mut history: Vec<Message>,
        tools: Vec<ToolDefinition>,
        cancel: CancellationToken,
        tx: mpsc::Sender<NormalizedStreamEvent>,
    ) -> TurnOutcome {
        let provider = self.client.name();
        let mut phase = TurnPhase::AwaitingModel;
        let mut executed: u32 = 0;

        loop {
            self.enter(&mut phase, TurnPhase::Streaming);
            let round = match self.stream_round(&history, &tools, &cancel, &tx).await {
                Ok(round) => round,
                Err(outcome) => {
                    if matches!(outcome, TurnOutcome::Failed(_)) {
                        self.enter(&mut phase, TurnPhase::Failed);
                    }
                    return outcome;
                }
            };

            // Ended without a terminal event: only cancellation does that
            let Some(stop) = round.stop else {
                return TurnOutcome::Cancelled;
            };

            let recoverable = stop == StopReason::ToolUseRequested && !round.rejected.is_empty();
            if round.calls.is_empty() && !recoverable {
                // A tool stop with nothing left to run ends the turn normally
                let stop = if stop == StopReason::ToolUseRequested {
                    StopReason::NaturalEnd
                } else {
                    stop
                };
                self.enter(&mut phase, TurnPhase::Completed);
                if tx.send(NormalizedStreamEvent::Completed(stop)).await.is_err() {
                    return TurnOutcome::Cancelled;
                }
                return TurnOutcome::Completed(stop);
            }

            self.enter(&mut phase, TurnPhase::ToolRequested);
            let requested = round
                .calls
                .iter()
                .cloned()
                .chain(round.rejected.iter().map(|call| ToolCall::new(&call.id, &call.name, call.arguments.clone())))
                .collect();
            history.push(
                Message::assistant_with_tool_calls(round.text, requested)
                    .with_reasoning(round.reasoning)
                    .with_reasoning_blocks(round.sealed),
            );

            for call in round.calls.into_iter().chain(round.rejected) {
                if executed >= self.max_chain_depth {
                    tracing::warn!(
                        provider,
                        limit = self.max_chain_depth,
                        tool = %call.name,
                        "tool chain depth exceeded"
                    );
                    self.enter(&mut phase, TurnPhase::Failed);
                    let error = LlmError::DepthExceeded(self.max_chain_depth).classify();
                    let _ = tx.send(NormalizedStreamEvent::Failed(error)).await;
                    return TurnOutcome::Failed(ErrorCode::DepthExceeded);
                }
                if cancel.is_cancelled() {
                    return TurnOutcome::Cancelled;
                }

                executed += 1;
                if call.is_error {
                    tracing::info!(provider, tool = %call.name, tool_call_id = %call.id, "returning malformed call to model");
                    history.push(Message::tool_result(call));
                    continue;
                }

                self.enter(&mut phase, TurnPhase::ExecutingTool);
                let Some(result) = self.execute(&call, &cancel).await else {
                    return TurnOutcome::Cancelled;
                };
                let call = match result {
                    Ok(output) => call.with_result(output),
                    Err(e) => {
                        let error = LlmError::ToolExecution {
                            tool: call.name.clone(),
                            message: e.message,
                        };
                        tracing::info!(provider, code = %error.code(), error = %error, "reporting tool failure to model");
                        call.with_error(error.to_string())
                    }
                };
                history.push(Message::tool_result(call));
            }

            self.enter(&mut phase, TurnPhase::AwaitingModel);
        }
    }

    /// Stream one model response, forwarding everything but `Completed`
    async fn stream_round(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
        cancel: &CancellationToken,
        tx: &mpsc::Sender<NormalizedStreamEvent>,
    ) -> Result<Round, TurnOutcome> {
        let mut round = Round::default();
        let mut events = self.client.stream(history.to_vec(), tools.to_vec(), cancel.clone());

        while let Some(event) = events.next().await {
            match &event {
                NormalizedStreamEvent::TextDelta(text) => round.text.push_str(text),
                NormalizedStreamEvent::ReasoningDelta(text) => round.reasoning.push_str(text),
                NormalizedStreamEvent::ToolCallRequested { id, name, arguments } => {
                    round.calls.push(ToolCall::new(id.as_str(), name.as_str(), arguments.clone()));
                }
                NormalizedStreamEvent::ReasoningSealed(block) => {
                    round.sealed.push(block.clone());
                    continue;
                }
                NormalizedStreamEvent::Completed(stop) => {
                    round.stop = Some(*stop);
                    continue;
                }
                NormalizedStreamEvent::Failed(error) if error.is_scoped() => {
                    round.rejected.extend(rejected_call(error));
                }
                NormalizedStreamEvent::Failed(error) => {
                    let code = error.code;
                    let _ = tx.send(event).await;
                    return Err(TurnOutcome::Failed(code));
                }
            }
            if tx.send(event).await.is_err() {
                return Err(TurnOutcome::Cancelled);
            }
        }

        if cancel.is_cancelled() {
            return Err(TurnOutcome::Cancelled);
        }
        Ok(round)
    }

    /// Run one tool call
    ///
    /// Returns `None` when the turn is cancelled first. The call itself keeps
    /// running to completion and its result is dropped.
    async fn execute(&self, call: &ToolCall, cancel: &CancellationToken) -> Option<Result<String, ToolError>> {
        tracing::debug!(provider = self.client.name(), tool = %call.name, tool_call_id = %call.id, "executing tool");

        let executor = Arc::clone(&self.executor);
        let name = call.name.clone();
        let arguments = call.arguments.clone();
        let task = tokio::spawn(async move { executor.execute(&name, &arguments).await });

        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(tool = %call.name, "turn cancelled while tool runs; result will be discarded");
                None
            }
            joined = task => Some(joined.unwrap_or_else(|e| Err(ToolError::new(format!("tool task failed: {e}"))))),
        }
    }

    fn enter(&self, phase: &mut TurnPhase, next: TurnPhase) {
        tracing::debug!(provider = self.client.name(), from = %phase, to = %next, "turn phase");
        *phase = next;
    }
}

/// Error result for a call the model sent with unusable arguments
fn rejected_call(error: &ClassifiedError) -> Option<ToolCall> {
    let id = error.tool_call_id.as_deref().filter(|id| !id.is_empty())?;
    let name = error.tool_name.as_deref()?;
    Some(ToolCall::new(id, name, Value::Object(Map::new())).with_error(error.message.clone()))
}
