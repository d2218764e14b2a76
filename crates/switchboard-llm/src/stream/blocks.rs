use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{ClassifiedError, ErrorCode};
use crate::types::{NormalizedStreamEvent, ReasoningBlock};

/// Kind of content block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockKind {
    Text,
    Reasoning,
    ToolUse,
}

/// State of one open content block
#[derive(Debug)]
pub(crate) struct Block {
    kind: BlockKind,
    buffer: String,
    tool_id: Option<String>,
    tool_name: Option<String>,
    signature: String,
    redacted: Option<String>,
    corrupt: bool,
}

impl Block {
    const fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            buffer: String::new(),
            tool_id: None,
            tool_name: None,
            signature: String::new(),
            redacted: None,
            corrupt: false,
        }
    }

    /// Fill identifiers that arrive after the block opened
    pub(crate) fn identify(&mut self, id: Option<&str>, name: Option<&str>) {
        if self.tool_id.is_none()
            && let Some(id) = id.filter(|id| !id.is_empty())
        {
            self.tool_id = Some(id.to_owned());
        }
        if self.tool_name.is_none()
            && let Some(name) = name.filter(|name| !name.is_empty())
        {
            self.tool_name = Some(name.to_owned());
        }
    }

    pub(crate) fn push(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// A record belonging to this block could not be decoded
    pub(crate) const fn corrupt(&mut self) {
        self.corrupt = true;
    }

    /// Event produced when the block closes
    fn close(self) -> Option<NormalizedStreamEvent> {
        match self.kind {
            BlockKind::Text => None,
            BlockKind::Reasoning => sealed_reasoning(self.buffer, self.signature, self.redacted, self.corrupt),
            BlockKind::ToolUse if self.corrupt => {
                let id = self.tool_id.unwrap_or_default();
                let label = self.tool_name.as_deref().unwrap_or("unknown");
                tracing::warn!(tool = %label, tool_call_id = %id, "tool call lost an undecodable fragment");
                let message = format!("arguments for tool '{label}' are incomplete: a stream record could not be decoded");
                Some(malformed(&id, self.tool_name.as_deref(), message))
            }
            BlockKind::ToolUse => Some(tool_call_event(self.tool_id, self.tool_name, &self.buffer)),
        }
    }
}

/// Open blocks keyed by content-block index
#[derive(Debug, Default)]
pub(crate) struct BlockMap {
    blocks: BTreeMap<u32, Block>,
    tool_calls: usize,
}

impl BlockMap {
    /// Open a text or reasoning block
    pub(crate) fn open(&mut self, index: u32, kind: BlockKind) {
        self.blocks.insert(index, Block::new(kind));
    }

    /// Open a reasoning block whose content the provider withheld
    pub(crate) fn open_redacted(&mut self, index: u32, data: String) {
        let mut block = Block::new(BlockKind::Reasoning);
        block.redacted = Some(data);
        self.blocks.insert(index, block);
    }

    /// Append a signature fragment to an open reasoning block
    pub(crate) fn sign(&mut self, index: u32, fragment: &str) {
        match self.blocks.get_mut(&index) {
            Some(block) if block.kind == BlockKind::Reasoning => block.signature.push_str(fragment),
            other => tracing::debug!(index, kind = ?other.map(|block| block.kind), "signature for a block that is not reasoning"),
        }
    }

    /// Open a tool-use block, or return the existing one at `index`
    pub(crate) fn tool(&mut self, index: u32) -> &mut Block {
        let tool_calls = &mut self.tool_calls;
        self.blocks.entry(index).or_insert_with(|| {
            *tool_calls += 1;
            Block::new(BlockKind::ToolUse)
        })
    }

    /// Append a fragment to an open block, returning its kind
    pub(crate) fn append(&mut self, index: u32, fragment: &str) -> Option<BlockKind> {
        let block = self.blocks.get_mut(&index)?;
        block.push(fragment);
        Some(block.kind)
    }

    /// Mark the open block at `index` as corrupt, returning its kind
    pub(crate) fn corrupt(&mut self, index: u32) -> Option<BlockKind> {
        let block = self.blocks.get_mut(&index)?;
        block.corrupt();
        Some(block.kind)
    }

    /// Close one block
    pub(crate) fn close(&mut self, index: u32) -> Option<NormalizedStreamEvent> {
        self.blocks.remove(&index).and_then(Block::close)
    }

    /// Close every open block in index order
    pub(crate) fn close_all(&mut self) -> Vec<NormalizedStreamEvent> {
        std::mem::take(&mut self.blocks)
            .into_values()
            .filter_map(Block::close)
            .collect()
    }

    /// Whether any tool-use block was opened in this response
    pub(crate) const fn saw_tool_use(&self) -> bool {
        self.tool_calls > 0
    }
}

/// Reasoning worth replaying: withheld payloads, or signed thinking that
/// arrived intact
fn sealed_reasoning(
    thinking: String,
    signature: String,
    redacted: Option<String>,
    corrupt: bool,
) -> Option<NormalizedStreamEvent> {
    let block = match redacted {
        Some(data) => ReasoningBlock::Redacted { data },
        None if corrupt || signature.is_empty() => return None,
        None => ReasoningBlock::Thinking { thinking, signature },
    };
    Some(NormalizedStreamEvent::ReasoningSealed(block))
}

fn tool_call_event(id: Option<String>, name: Option<String>, buffer: &str) -> NormalizedStreamEvent {
    let id = id.unwrap_or_default();

    let Some(name) = name else {
        return malformed(&id, None, "tool call block carried no tool name".to_owned());
    };

    let trimmed = buffer.trim();
    let arguments = if trimmed.is_empty() {
        Value::Object(Map::new())
    } else {
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(tool = %name, tool_call_id = %id, error = %e, "tool call arguments are not valid JSON");
                return malformed(&id, Some(&name), format!("arguments for tool '{name}' are not valid JSON: {e}"));
            }
        }
    };

    NormalizedStreamEvent::ToolCallRequested { id, name, arguments }
}

fn malformed(id: &str, name: Option<&str>, message: String) -> NormalizedStreamEvent {
    let mut error = ClassifiedError::new(ErrorCode::MalformedResponse, message).with_tool_call(id);
    if let Some(name) = name {
        error = error.with_tool_name(name);
    }
    NormalizedStreamEvent::Failed(error)
}
