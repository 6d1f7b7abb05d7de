//! `memory_add`: store a finding in long-term memory.

use async_trait::async_trait;
use shrimp_core::error::ToolError;
use shrimp_core::memory::{MemoryBackend, MemoryEntry};
use shrimp_core::tool::{Tool, ToolContext, ToolResult};
use std::sync::Arc;

pub struct MemoryAddTool {
    backend: Arc<dyn MemoryBackend>,
}

impl MemoryAddTool {
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for MemoryAddTool {
    fn name(&self) -> &str {
        "memory_add"
    }

    fn description(&self) -> &str {
        "Add a fact, finding, or summary to long-term memory so it can be found \
         later with memory_search."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The text to store"
                },
                "source": {
                    "type": "string",
                    "description": "Optional source, e.g. a URL or topic"
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?
            .trim();
        if content.is_empty() {
            return Ok(ToolResult::failure("Content to store cannot be empty."));
        }
        let source = arguments["source"].as_str().unwrap_or("").trim();

        match self
            .backend
            .store(MemoryEntry::new(content).with_source(source))
            .await
        {
            Ok(id) => Ok(ToolResult::ok(format!("Stored in memory (id: {id})."))),
            Err(e) => Ok(ToolResult::failure(format!("Memory store failed: {e}"))),
        }
    }
}
