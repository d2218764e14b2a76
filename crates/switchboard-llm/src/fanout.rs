//! Same turn against several models at once
//!
//! Each member runs its own orchestrator and provider client as an
//! independent task. Events reach the shared channel tagged with the
//! member's model id; there is no ordering between members.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::orchestrator::{ToolOrchestrator, TurnOutcome};
use crate::types::{Message, NormalizedStreamEvent, ToolDefinition};

/// Event buffer per member
const MEMBER_BUFFER: usize = 64;

/// Event tagged with the model that produced it
pub type KeyedEvent = (String, NormalizedStreamEvent);

/// One model taking part in a fan-out
pub struct FanOutMember {
    /// Identifier events are keyed by
    pub model_id: String,
    /// Pipeline for this model, or why it could not be built
    pub pipeline: Result<ToolOrchestrator, LlmError>,
    /// Cancels only this member
    pub cancel: CancellationToken,
}

/// Run one member, tagging its events with its model id
pub async fn run_member(
    member: FanOutMember,
    history: Vec<Message>,
    tools: Vec<ToolDefinition>,
    tx: mpsc::Sender<KeyedEvent>,
) -> TurnOutcome {
    let FanOutMember {
        model_id,
        pipeline,
        cancel,
    } = member;

    let orchestrator = match pipeline {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::warn!(model = %model_id, error = %e, "fan-out member could not start");
            let error = e.classify();
            let code = error.code;
            let _ = tx.send((model_id, NormalizedStreamEvent::Failed(error))).await;
            return TurnOutcome::Failed(code);
        }
    };

    let (member_tx, mut member_rx) = mpsc::channel(MEMBER_BUFFER);
    let forward = async {
        while let Some(event) = member_rx.recv().await {
            if tx.send((model_id.clone(), event)).await.is_err() {
                break;
            }
        }
    };

    let (outcome, ()) = tokio::join!(orchestrator.run(history, tools, cancel, member_tx), forward);
    tracing::debug!(model = %model_id, ?outcome, "fan-out member finished");
    outcome
}

/// Run every member concurrently and wait for all of them
///
/// A failure or cancellation of one member leaves the others running.
pub async fn run(
    members: Vec<FanOutMember>,
    history: &[Message],
    tools: &[ToolDefinition],
    tx: mpsc::Sender<KeyedEvent>,
) -> Vec<(String, TurnOutcome)> {
    let tasks: Vec<_> = members
        .into_iter()
        .map(|member| {
            let model_id = member.model_id.clone();
            let task = tokio::spawn(run_member(member, history.to_vec(), tools.to_vec(), tx.clone()));
            (model_id, task)
        })
        .collect();
    drop(tx);

    let mut outcomes = Vec::with_capacity(tasks.len());
    for (model_id, task) in tasks {
        let outcome = task.await.unwrap_or_else(|e| {
            tracing::error!(model = %model_id, error = %e, "fan-out member task aborted");
            TurnOutcome::Cancelled
        });
        outcomes.push((model_id, outcome));
    }
    outcomes
}
