//! Provider-neutral data model

mod event;
mod message;
mod provider;
mod tool;

pub use event::{NormalizedStreamEvent, StopReason};
pub use message::{Attachment, Message, ReasoningBlock, Role};
pub use provider::{ModelTarget, WireDialect};
pub use switchboard_config::{ProviderConfig, ProviderKind};
pub use tool::{ToolCall, ToolDefinition};
