//! Entry points for callers
//!
//! [`Engine`] owns everything shared between turns: the HTTP client, the
//! circuit breaker registry, the retry policy, the secret resolver and the
//! tool executor. Each turn or fan-out gets an id that can later be used to
//! cancel it.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures_util::Stream;
use switchboard_config::Config;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::circuit::CircuitBreakerRegistry;
use crate::client::{ClientContext, ProviderClient};
use crate::error::LlmError;
use crate::fanout::{self, FanOutMember, KeyedEvent};
use crate::orchestrator::{ToolExecutor, ToolOrchestrator};
use crate::secret::{ConfigSecretResolver, SecretResolver};
use crate::types::{Message, ModelTarget, NormalizedStreamEvent, ToolDefinition};

/// Events buffered per turn
const TURN_BUFFER: usize = 64;

/// Identifier of a single-model turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(Uuid);

impl TurnId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a fan-out group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FanOutId(Uuid);

impl FanOutId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for FanOutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Events of one single-model turn
///
/// Yields nothing once the turn has been cancelled.
#[derive(Debug)]
pub struct TurnStream {
    id: TurnId,
    rx: mpsc::Receiver<NormalizedStreamEvent>,
    cancel: CancellationToken,
}

impl TurnStream {
    /// Id to pass to [`Engine::cancel`]
    pub const fn id(&self) -> TurnId {
        self.id
    }
}

impl Stream for TurnStream {
    type Item = NormalizedStreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

/// Events of a fan-out, keyed by model id
///
/// Events of a member cancelled on its own are dropped, including any
/// already queued.
#[derive(Debug)]
pub struct FanOutStream {
    id: FanOutId,
    members: Vec<(String, TurnId)>,
    member_cancels: HashMap<String, CancellationToken>,
    rx: mpsc::Receiver<KeyedEvent>,
    cancel: CancellationToken,
}

impl FanOutStream {
    /// Id to pass to [`Engine::cancel_all`]
    pub const fn id(&self) -> FanOutId {
        self.id
    }

    /// Model ids with the turn id cancelling just that member
    pub fn members(&self) -> &[(String, TurnId)] {
        &self.members
    }
}

impl Stream for FanOutStream {
    type Item = KeyedEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.cancel.is_cancelled() {
                return Poll::Ready(None);
            }
            match self.rx.poll_recv(cx) {
                Poll::Ready(Some((model, _)))
                    if self.member_cancels.get(&model).is_some_and(CancellationToken::is_cancelled) => {}
                other => return other,
            }
        }
    }
}

/// Streaming inference engine
#[derive(Clone)]
pub struct Engine {
    context: ClientContext,
    executor: Arc<dyn ToolExecutor>,
    max_chain_depth: u32,
    turns: Arc<DashMap<TurnId, CancellationToken>>,
    fan_outs: Arc<DashMap<FanOutId, CancellationToken>>,
}

impl Engine {
    /// Create an engine reading API keys from configuration
    pub fn new(config: &Config, executor: Arc<dyn ToolExecutor>) -> Result<Self, LlmError> {
        Self::with_secrets(config, executor, Arc::new(ConfigSecretResolver))
    }

    /// Create an engine with a custom secret resolver
    pub fn with_secrets(
        config: &Config,
        executor: Arc<dyn ToolExecutor>,
        secrets: Arc<dyn SecretResolver>,
    ) -> Result<Self, LlmError> {
        let context = ClientContext::new(config, secrets)?;
        Ok(Self {
            context,
            executor,
            max_chain_depth: config.tools.max_chain_depth,
            turns: Arc::new(DashMap::new()),
            fan_outs: Arc::new(DashMap::new()),
        })
    }

    /// Circuit breaker registry shared by every turn
    pub fn breaker(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.context.breaker
    }

    /// Number of turns still running
    pub fn active_turns(&self) -> usize {
        self.turns.len()
    }

    fn orchestrator(&self, target: &ModelTarget) -> Result<ToolOrchestrator, LlmError> {
        let client = ProviderClient::new(target.id.as_str(), target.config.clone(), self.context.clone())?;
        Ok(ToolOrchestrator::new(
            Arc::new(client),
            Arc::clone(&self.executor),
            self.max_chain_depth,
        ))
    }

    /// Start a single-model turn
    ///
    /// Configuration problems are reported as the stream's only event.
    pub fn start_turn(&self, history: Vec<Message>, target: ModelTarget, tools: Vec<ToolDefinition>) -> TurnStream {
        let id = TurnId::new();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(TURN_BUFFER);

        match self.orchestrator(&target) {
            Ok(orchestrator) => {
                self.turns.insert(id, cancel.clone());
                let turns = Arc::clone(&self.turns);
                let token = cancel.clone();
                tokio::spawn(async move {
                    let outcome = orchestrator.run(history, tools, token, tx).await;
                    tracing::info!(turn = %id, model = %target.id, ?outcome, "turn finished");
                    turns.remove(&id);
                });
            }
            Err(e) => {
                tracing::warn!(turn = %id, model = %target.id, error = %e, "turn could not start");
                let _ = tx.try_send(NormalizedStreamEvent::Failed(e.classify()));
            }
        }

        TurnStream { id, rx, cancel }
    }

    /// Start the same turn against several models
    ///
    /// Each member can be cancelled on its own through [`FanOutStream::members`].
    pub fn start_fan_out(
        &self,
        history: Vec<Message>,
        targets: Vec<ModelTarget>,
        tools: Vec<ToolDefinition>,
    ) -> FanOutStream {
        let id = FanOutId::new();
        let group = CancellationToken::new();
        let (tx, rx) = mpsc::channel(TURN_BUFFER * targets.len().max(1));

        let mut members = Vec::with_capacity(targets.len());
        let mut handles = Vec::with_capacity(targets.len());
        let mut member_cancels = HashMap::with_capacity(targets.len());
        for target in targets {
            let turn = TurnId::new();
            let cancel = group.child_token();
            self.turns.insert(turn, cancel.clone());
            handles.push((target.id.clone(), turn));
            member_cancels.insert(target.id.clone(), cancel.clone());
            members.push(FanOutMember {
                model_id: target.id.clone(),
                pipeline: self.orchestrator(&target),
                cancel,
            });
        }

        self.fan_outs.insert(id, group.clone());
        let turns = Arc::clone(&self.turns);
        let fan_outs = Arc::clone(&self.fan_outs);
        let member_turns: Vec<TurnId> = handles.iter().map(|(_, turn)| *turn).collect();
        tokio::spawn(async move {
            let outcomes = fanout::run(members, &history, &tools, tx).await;
            tracing::info!(fan_out = %id, ?outcomes, "fan-out finished");
            for turn in member_turns {
                turns.remove(&turn);
            }
            fan_outs.remove(&id);
        });

        FanOutStream {
            id,
            members: handles,
            member_cancels,
            rx,
            cancel: group,
        }
    }

    /// Cancel a turn, or one member of a fan-out
    ///
    /// Returns `false` when the turn is unknown or already finished.
    pub fn cancel(&self, id: TurnId) -> bool {
        self.turns.get(&id).is_some_and(|token| {
            tracing::debug!(turn = %id, "cancelling turn");
            token.cancel();
            true
        })
    }

    /// Cancel every member of a fan-out
    pub fn cancel_all(&self, id: FanOutId) -> bool {
        self.fan_outs.get(&id).is_some_and(|token| {
            tracing::debug!(fan_out = %id, "cancelling fan-out");
            token.cancel();
            true
        })
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("context", &self.context)
            .field("max_chain_depth", &self.max_chain_depth)
            .field("turns", &self.turns.len())
            .finish_non_exhaustive()
    }
}
