use serde::Deserialize;

/// Tool loop limits
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Maximum tool executions in a single conversation turn
    #[serde(default = "default_max_chain_depth")]
    pub max_chain_depth: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: default_max_chain_depth(),
        }
    }
}

const fn default_max_chain_depth() -> u32 {
    15
}

/// Attachment validation limits
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachmentsConfig {
    /// Maximum images across the whole request
    #[serde(default = "default_max_count")]
    pub max_count: usize,
    /// Maximum size of a single image in bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            max_count: default_max_count(),
            max_bytes: default_max_bytes(),
        }
    }
}

const fn default_max_count() -> usize {
    20
}

// 3.75 MiB
const fn default_max_bytes() -> usize {
    3_932_160
}
