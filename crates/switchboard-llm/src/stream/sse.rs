use std::fmt;
use std::pin::pin;

use eventsource_stream::{Event, Eventsource};
use futures_util::{Stream, StreamExt};

use crate::error::LlmError;
use crate::types::{NormalizedStreamEvent, WireDialect};

use super::{StreamParser, parser_for};

/// Feed one SSE record to a parser
///
/// Records with no data are keep-alives and produce nothing.
pub fn dispatch(parser: &mut dyn StreamParser, event: &Event) -> Vec<NormalizedStreamEvent> {
    if event.data.trim().is_empty() {
        return Vec::new();
    }
    parser.parse(&event.event, &event.data)
}

/// Parse a complete byte stream for one response
///
/// Used for replaying captured responses; live requests go through the
/// provider client, which adds timeouts and cancellation.
pub async fn collect<S, B, E>(dialect: WireDialect, bytes: S) -> Vec<NormalizedStreamEvent>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    let mut parser = parser_for(dialect);
    let mut records = pin!(bytes.eventsource());
    let mut events = Vec::new();

    while let Some(record) = records.next().await {
        match record {
            Ok(record) => {
                events.extend(dispatch(parser.as_mut(), &record));
                if events.last().is_some_and(NormalizedStreamEvent::is_terminal) {
                    return events;
                }
            }
            Err(e) => {
                events.push(NormalizedStreamEvent::Failed(
                    LlmError::Connection(e.to_string()).classify(),
                ));
                return events;
            }
        }
    }

    events.extend(parser.finish());
    events
}
