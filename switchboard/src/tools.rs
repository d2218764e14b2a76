//! Built-in tools offered with `--tools`

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};
use switchboard_llm::{ToolDefinition, ToolError, ToolExecutor};
use tokio::io::AsyncReadExt;

/// Largest file prefix returned by `read_file`
const MAX_READ_BYTES: u64 = 64 * 1024;

/// Tools that run on the local machine
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTools;

impl LocalTools {
    /// Definitions advertised to the model
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                "current_time",
                "Current date and time, optionally in an IANA time zone",
                json!({
                    "type": "object",
                    "properties": {
                        "time_zone": {"type": "string", "description": "IANA zone such as Europe/Berlin"}
                    }
                }),
            ),
            ToolDefinition::new(
                "read_file",
                "Read a UTF-8 text file from the local disk",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "File path"}
                    },
                    "required": ["path"]
                }),
            ),
        ]
    }
}

#[async_trait]
impl ToolExecutor for LocalTools {
    async fn execute(&self, name: &str, arguments: &Value) -> Result<String, ToolError> {
        match name {
            "current_time" => current_time(arguments.get("time_zone").and_then(Value::as_str)),
            "read_file" => {
                let path = arguments
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ToolError::new("missing required argument 'path'"))?;
                read_file(Path::new(path)).await
            }
            other => Err(ToolError::new(format!("unknown tool '{other}'"))),
        }
    }
}

fn current_time(time_zone: Option<&str>) -> Result<String, ToolError> {
    let now = match time_zone {
        Some(zone) => jiff::Timestamp::now()
            .in_tz(zone)
            .map_err(|e| ToolError::new(format!("unknown time zone '{zone}': {e}")))?,
        None => jiff::Zoned::now(),
    };
    Ok(now.strftime("%Y-%m-%dT%H:%M:%S%:z [%Q]").to_string())
}

async fn read_file(path: &Path) -> Result<String, ToolError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| ToolError::new(format!("cannot open {}: {e}", path.display())))?;

    let mut bytes = Vec::new();
    file.take(MAX_READ_BYTES + 1)
        .read_to_end(&mut bytes)
        .await
        .map_err(|e| ToolError::new(format!("cannot read {}: {e}", path.display())))?;

    let truncated = u64::try_from(bytes.len()).is_ok_and(|len| len > MAX_READ_BYTES);
    bytes.truncate(usize::try_from(MAX_READ_BYTES).unwrap_or(usize::MAX));

    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if truncated {
        text.push_str("\n[truncated at 64 KiB]");
    }
    Ok(text)
}
