#![allow(dead_code)]

pub mod config;
pub mod mock_llm;
pub mod sse;

use futures::StreamExt;
use switchboard_llm::{ErrorCode, NormalizedStreamEvent, TurnStream};

/// Drain a turn stream
pub async fn collect(stream: TurnStream) -> Vec<NormalizedStreamEvent> {
    stream.collect().await
}

/// Concatenated text deltas
pub fn text(events: &[NormalizedStreamEvent]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            NormalizedStreamEvent::TextDelta(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

/// Code of the turn-level failure, if any
pub fn failure(events: &[NormalizedStreamEvent]) -> Option<ErrorCode> {
    events.iter().find_map(|event| match event {
        NormalizedStreamEvent::Failed(error) if !error.is_scoped() => Some(error.code),
        _ => None,
    })
}

/// Number of terminal events
pub fn terminals(events: &[NormalizedStreamEvent]) -> usize {
    events.iter().filter(|event| event.is_terminal()).count()
}
